//! css-purge: removes unused CSS from a static site's stylesheets and from
//! the inline style blocks copied out of them.

mod cli;
mod config;
mod inline;
mod orchestrator;
mod output;

use clap::Parser;
use cli::Args;
use miette::Result;

fn main() -> Result<()> {
    let args = Args::parse();

    match orchestrator::run(args) {
        Ok(summary) => {
            if summary.has_failures() {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
