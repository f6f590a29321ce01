// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for retroforge.

use clap::Parser;

use retroforge::assembler::cli::Cli;

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    let use_color = !cli.no_color && std::env::var_os("NO_COLOR").is_none();
    match retroforge::assembler::run(&cli) {
        Ok(report) => {
            for diag in report.diagnostics() {
                eprintln!("{}", diag.format_with_context(use_color));
            }
        }
        Err(err) => {
            for diag in err.diagnostics() {
                eprintln!("{}", diag.format_with_context(use_color));
            }
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
