//! Print the fields of an NCCH file.
//!
//! ```text
//! cargo run --example inspect -- game.cxi [secrets.txt] [seeddb.bin]
//! ```
//!
//! Set `RUST_LOG=debug` to see key and seed decisions.

use std::env;
use std::fs::File;
use std::process::ExitCode;
use std::rc::Rc;

use ctrkit::container::{Container, Node, Scalar};
use ctrkit::formats::ncch::Ncch;
use ctrkit::keys::{self, SecretDb, SeedDb};
use ctrkit::{Result, source};

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(path) = args.first() else {
        eprintln!("usage: inspect <ncch> [secrets] [seeddb.bin]");
        return ExitCode::FAILURE;
    };

    match run(path, args.get(1), args.get(2)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(path: &str, secrets: Option<&String>, seeddb: Option<&String>) -> Result<()> {
    let mut secret_db = SecretDb::new();
    if let Some(secrets) = secrets {
        secret_db.load(File::open(secrets)?)?;
    }
    let mut seed_db = SeedDb::new();
    if let Some(seeddb) = seeddb {
        seed_db.load_seeddb(File::open(seeddb)?)?;
    }

    let ncch = Ncch::open(source::open_file(path)?, Rc::new(secret_db), &seed_db)?;
    print_container(&ncch, 0);
    Ok(())
}

fn print_container(c: &Container, depth: usize) {
    let indent = "  ".repeat(depth);
    for name in c.names() {
        match c.open(&name) {
            Ok(node) => match &*node {
                Node::Scalar(Scalar::Text(reason)) if name.ends_with("Error") => {
                    match keys::describe(reason) {
                        Some(what) => println!("{indent}{name}: missing {reason} ({what})"),
                        None => println!("{indent}{name}: {reason}"),
                    }
                }
                Node::Scalar(v) => println!("{indent}{name}: {v}"),
                Node::Source(s) => println!("{indent}{name}: <{:#x} bytes>", s.len()),
                Node::Check(check) => match check.verify() {
                    Ok(ok) => println!("{indent}{name}: {}", if ok { "ok" } else { "FAIL" }),
                    Err(e) => println!("{indent}{name}: <{e}>"),
                },
                Node::Container(child) => {
                    println!("{indent}{name}:");
                    print_container(child, depth + 1);
                }
            },
            Err(e) => println!("{indent}{name}: <{e}>"),
        }
    }
}
