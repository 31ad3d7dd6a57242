//! The disassembler front end: parse the flag cluster, decode each class
//! file, and print it. Files that fail to open or decode are reported and
//! the remaining files still print.

use std::env;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::process::exit;

use mini_jvm::javap::{self, Options};
use mini_jvm::ClassFile;

fn usage() -> ! {
    eprintln!("usage: javap [-clpsv] classfile...");
    exit(1);
}

fn parse_options(args: &[String]) -> (Options, Vec<String>) {
    let mut options = Options::default();
    let mut files = Vec::new();

    for (index, arg) in args.iter().enumerate() {
        if let Some(flags) = arg.strip_prefix('-') {
            if flags.is_empty() {
                usage();
            }
            for flag in flags.chars() {
                match flag {
                    'c' => options.code = true,
                    'l' => options.lines = true,
                    'p' => options.private = true,
                    's' => options.signatures = true,
                    'v' => options = Options::verbose(),
                    _ => usage(),
                }
            }
        } else {
            files.extend_from_slice(&args[index..]);
            break;
        }
    }

    (options, files)
}

fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (options, files) = parse_options(&args);
    if files.is_empty() {
        usage();
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut exit_code = 0;

    for path in &files {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) => {
                eprintln!("javap: {}: {}", path, error);
                exit_code = 1;
                continue;
            }
        };

        match ClassFile::read(&mut BufReader::new(file)) {
            Ok(class) => {
                if let Err(error) = javap::disassemble(&mut out, &class, &options) {
                    eprintln!("javap: {}: {}", path, error);
                    exit_code = 1;
                }
            }
            Err(error) => {
                eprintln!("javap: {}: {}", path, error);
                exit_code = 1;
            }
        }
    }

    out.flush().ok();
    exit(exit_code);
}
