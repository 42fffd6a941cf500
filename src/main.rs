// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![deny(clippy::undocumented_unsafe_blocks)]
#![deny(unsafe_op_in_unsafe_fn)]

mod configfs;
mod console;
mod dtb;
mod error;
mod logger;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use dtboverlay_device_tree::fdt::Fdt;
use dtboverlay_device_tree::{
    Assumptions, ChangeSetId, FdtErrorKind, apply_overlay, remove_overlay,
};
use log::{LevelFilter, debug, error, info, warn};

use crate::configfs::ConfigfsOverlays;
use crate::dtb::DtbFile;
use crate::error::Error;

const LOG_LEVEL: LevelFilter = LevelFilter::Info;
const CONFIGFS_ENV: &str = "DTBOVERLAY_CONFIGFS";
const DEFAULT_CONFIGFS: &str = "/sys/kernel/config/device-tree/overlays";

const USAGE: &str = "usage: dtboverlay [-v] [--assume FLAGS] <check|dump|apply> <DTB>
       dtboverlay [-v] remove <ID>";

#[derive(Debug, PartialEq)]
enum Command {
    Check(PathBuf),
    Dump(PathBuf),
    Apply(PathBuf),
    Remove(ChangeSetId),
}

#[derive(Debug, PartialEq)]
struct Args {
    verbose: bool,
    assume: Assumptions,
    command: Command,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, Error> {
    let usage = |message: &str| Error::Usage(format!("{message}\n{USAGE}"));

    let mut verbose = false;
    let mut assume = Assumptions::empty();
    let command = loop {
        let arg = args.next().ok_or_else(|| usage("missing command"))?;
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            "--assume" => {
                let list = args.next().ok_or_else(|| usage("--assume needs a value"))?;
                assume |= Assumptions::parse_list(&list)
                    .map_err(|name| usage(&format!("unknown assumption {name:?}")))?;
            }
            _ => break arg,
        }
    };

    let operand = args
        .next()
        .ok_or_else(|| usage(&format!("{command} needs an argument")))?;
    if let Some(extra) = args.next() {
        return Err(usage(&format!("unexpected argument {extra:?}")));
    }

    let command = match command.as_str() {
        "check" => Command::Check(operand.into()),
        "dump" => Command::Dump(operand.into()),
        "apply" => Command::Apply(operand.into()),
        "remove" => Command::Remove(ChangeSetId(
            operand
                .parse()
                .map_err(|_e| usage(&format!("invalid change set id {operand:?}")))?,
        )),
        _ => return Err(usage(&format!("unknown command {command:?}"))),
    };

    Ok(Args {
        verbose,
        assume,
        command,
    })
}

fn main() -> ExitCode {
    let console = console::init(std::io::stderr());
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let max_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LOG_LEVEL
    };
    if let Err(e) = logger::init(console, max_level) {
        eprintln!("failed to initialise logger: {e}");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            if let Some(code) = e.fdt_code() {
                debug!("libfdt error code {code}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    match &args.command {
        Command::Check(path) => {
            let file = DtbFile::read(path)?;
            let fdt = Fdt::with_assumptions(file.bytes(), args.assume)?;
            check(&fdt)?;
            info!("{}: valid device tree", path.display());
        }
        Command::Dump(path) => {
            let file = DtbFile::read(path)?;
            let fdt = Fdt::with_assumptions(file.bytes(), args.assume)?;
            check(&fdt)?;
            print!("{fdt}");
        }
        Command::Apply(path) => {
            let file = DtbFile::read(path)?;
            let mut overlays = ConfigfsOverlays::new(configfs_root());
            let id = apply_overlay(&mut overlays, file.bytes(), args.assume)?;
            println!("{id}");
        }
        Command::Remove(id) => {
            let mut overlays = ConfigfsOverlays::new(configfs_root());
            remove_overlay(&mut overlays, *id)?;
        }
    }
    Ok(())
}

fn configfs_root() -> PathBuf {
    env::var_os(CONFIGFS_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIGFS), PathBuf::from)
}

/// Checks the whole structure block so that a corrupt or unbalanced tree is
/// reported up front, and logs a summary of the header and the tree.
fn check(fdt: &Fdt<'_>) -> Result<(), Error> {
    info!(
        "version {} (compatible with {}), {} bytes, boot CPU {}",
        fdt.version(),
        fdt.last_comp_version(),
        fdt.totalsize(),
        fdt.boot_cpuid_phys()
    );
    debug!("{fdt:?}");
    if let Err(e) = fdt.check_layout() {
        warn!("{e}");
    }
    fdt.check_structure()?;

    let mut nodes = 0;
    let mut properties = 0;
    let mut next = fdt.root_offset();
    while let Ok(offset) = next {
        nodes += 1;
        let mut prop = fdt.first_property_offset(offset);
        while let Ok(prop_offset) = prop {
            fdt.property_by_offset(prop_offset)?;
            properties += 1;
            prop = fdt.next_property_offset(prop_offset);
        }
        not_found_or(prop)?;
        next = fdt.next_node(offset, None);
    }
    not_found_or(next)?;

    info!(
        "{nodes} nodes, {properties} properties, {} memory reservations",
        fdt.num_mem_rsv()
    );
    Ok(())
}

/// Turns the `NotFound` that ends a walk into success.
fn not_found_or(result: dtboverlay_device_tree::Result<usize>) -> Result<(), Error> {
    match result {
        Err(e) if e.kind == FdtErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
        Ok(_) => Ok(()),
    }
}
