//! The launcher: resolve the class path, load and initialize the main
//! class, and run `main` with the remaining arguments. Any fatal error
//! prints one line to stderr and exits nonzero.

use std::env;
use std::process::exit;

use mini_jvm::{ClassPath, JavaVm};

fn usage() -> ! {
    eprintln!("usage: java [-cp classpath] class");
    exit(1);
}

fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut class_path_arg: Option<String> = None;

    let mut index = 1;
    while index < args.len() && args[index].starts_with('-') {
        match args[index].as_str() {
            "-cp" => {
                index += 1;
                match args.get(index) {
                    Some(value) => class_path_arg = Some(value.clone()),
                    None => usage(),
                }
            }
            _ => usage(),
        }
        index += 1;
    }

    if index >= args.len() {
        usage();
    }
    let main_class = &args[index];
    let program_args = args[index + 1..].to_vec();

    let class_path = match class_path_arg {
        Some(text) => ClassPath::new(&text),
        None => ClassPath::from_env(),
    };

    let mut vm = JavaVm::new(class_path);
    if let Err(error) = vm.entry_point(main_class, program_args) {
        eprintln!("java: {}", error);
        exit(1);
    }
}
