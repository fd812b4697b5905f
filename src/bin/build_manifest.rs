//! Generate `remotes-manifest.json` from a description of versioned remote builds.
//!
//! The input is a JSON array of remote builds:
//!
//! ```json
//! [
//!   {
//!     "name": "cart",
//!     "base_url": "http://localhost:3001",
//!     "versions": ["1.0.0", "2.0.0"],
//!     "exposes": { "CartWidget": "./CartWidget", "CartPage": "./CartPage" }
//!   }
//! ]
//! ```

use std::path::PathBuf;

use clap::Parser;

use remote_loader::{build_manifest, RemoteBuild};

#[derive(Parser, Debug)]
#[command(name = "build-manifest", version, about = "Emit the remotes manifest for versioned builds")]
struct Args {
    /// JSON file describing the remote builds
    #[arg(long, env = "REMOTE_BUILDS")]
    builds: PathBuf,

    /// Where to write the manifest (stdout when omitted)
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn main() -> remote_loader::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.builds)?;
    let builds: Vec<RemoteBuild> = serde_json::from_str(&raw)?;
    let manifest = build_manifest(&builds);
    let json = manifest.to_pretty_json()?;

    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, json)?;
            eprintln!(
                "Manifest for {} remote(s) written to {}",
                manifest.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}
