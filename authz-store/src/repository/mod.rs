pub mod acl;
pub mod action;
pub mod authorization;
pub mod principal;
pub mod realm;
pub mod resource;
pub mod resource_type;
pub mod role;
