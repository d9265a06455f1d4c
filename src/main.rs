//! Thin host shell: wires `Config` into a `Vm` and drives either a batch
//! load, one-shot source lines, or an interactive read-eval-print loop.

mod config;
mod error;
mod internals;
mod kernel;
mod runtime;

use config::Config;
use internals::files;
use internals::image;
use internals::io::StdIo;
use internals::messages::DebugLevel;
use internals::outer::interpret_line;
use runtime::Vm;
use std::io::{self, BufRead, Write};

fn main() {
    let config = Config::parse_args();
    let mut vm = Vm::new(Box::new(StdIo::new()));
    vm.msg.set_level(config.debug_level);

    if let Some(path) = &config.filename {
        let loaded = if config.is_image_file() {
            files::read_binary_file(path).and_then(|bytes| image::load_image(&mut vm, &bytes))
        } else {
            files::read_source_file(path).map(|text| {
                for line in text.lines() {
                    interpret_line(&mut vm, line);
                    if vm.should_exit() {
                        break;
                    }
                }
            })
        };
        if let Err(e) = loaded {
            vm.report(&e);
            std::process::exit(1);
        }
    }

    if !config.one_shot_lines.is_empty() {
        for line in &config.one_shot_lines {
            if vm.should_exit() {
                break;
            }
            interpret_line(&mut vm, line);
        }
        return;
    }

    run_interactive(&mut vm);
}

fn run_interactive(vm: &mut Vm) {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if vm.should_exit() {
            return;
        }
        let line = match lines.next() {
            Some(Ok(l)) => l,
            Some(Err(_)) | None => return,
        };
        interpret_line(vm, &line);
        if vm.should_exit() {
            return;
        }
        print!(" ok");
        if vm.msg.get_level() >= DebugLevel::Debug {
            print!(" ({})", vm.kernel.sp());
        }
        println!();
        let _ = io::stdout().flush();
    }
}
