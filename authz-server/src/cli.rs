use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "authz-server", about = "Stateful multi-tenant ABAC/RBAC policy engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server (decisions, admin CRUD, manifest, health) plus the
    /// background audit drainer and IdP sync scheduler.
    Serve,
    /// Apply pending embedded migrations and exit.
    Migrate,
    /// Apply a declarative manifest document from a file and exit (§6.5).
    ManifestApply {
        path: String,
        #[arg(long, default_value = "update")]
        mode: String,
    },
    /// Export a realm's current state as a manifest document to stdout (§6.5).
    ManifestExport { realm: String },
}
