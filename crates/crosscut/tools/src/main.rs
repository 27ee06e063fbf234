// Crosscut
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Crosscut CLI
//!
//! Entry point for the crosscut command-line tools.

use clap::{Parser, Subcommand};

use crosscut_tools::cli::check::{check_definition, CheckArgs};
use crosscut_tools::cli::weave::{WeaveArgs, WeavePipeline};

#[derive(Parser)]
#[command(name = "crosscut")]
#[command(about = "Crosscut - aspect weaving toolchain")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Weave a class model against an aspect definition document
    Weave(WeaveArgs),
    /// Validate an aspect definition document
    Check(CheckArgs),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Weave(args) => {
            let pipeline = WeavePipeline::new(args);
            let report = pipeline.execute()?;
            print!("{}", report.render_text());
            println!(
                "{} classes woven, {} join points, {} failures",
                report.woven_class_count(),
                report.join_point_count(),
                report.failure_count()
            );
        }
        Commands::Check(args) => {
            let summary = check_definition(&args)?;
            print!("{summary}");
        }
    }

    Ok(())
}
