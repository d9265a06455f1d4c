//! Outer interpreter (C6): the per-line driver.
//!
//! Tokenizes one line, intercepts the meta-commands that aren't dictionary
//! words (`BYE`, `QUIT`, `EXIT`, `SEE`, `LIST`, `LOAD`, `SAVE`, `SAVEB`,
//! `LOADB`), and hands everything else to the compiler. A compile-time error
//! reports one diagnostic and abandons the rest of the line; it never aborts
//! the session.

use crate::error::CoreError;
use crate::internals::compiler;
use crate::internals::files;
use crate::internals::image;
use crate::internals::tokenizer::Tokenizer;
use crate::runtime::Vm;

pub fn interpret_line(vm: &mut Vm, line: &str) {
    let mut tz = Tokenizer::new(line);
    while let Some(token) = tz.next_token() {
        if vm.should_exit() {
            return;
        }
        if !vm.compiling {
            match token.as_str() {
                // EXIT here is the REPL-exit directive, distinct from the
                // opcode of the same mnemonic that returns from a word body.
                "BYE" | "QUIT" | "EXIT" => {
                    vm.bye();
                    return;
                }
                "SEE" => {
                    handle_see(vm, &mut tz);
                    continue;
                }
                "LIST" => {
                    handle_list(vm);
                    continue;
                }
                "LOAD" => {
                    handle_load(vm, &mut tz);
                    continue;
                }
                "SAVE" => {
                    handle_save(vm, &mut tz);
                    continue;
                }
                "SAVEB" => {
                    handle_saveb(vm, &mut tz);
                    continue;
                }
                "LOADB" => {
                    handle_loadb(vm, &mut tz);
                    continue;
                }
                _ => {}
            }
        }

        if let Err(e) = compiler::handle_token(vm, &mut tz, &token) {
            vm.report(&e);
            vm.abandon_line();
            return;
        }
    }
}

fn print_line(vm: &mut Vm, text: &str) {
    for b in text.bytes() {
        vm.io.write_char(b);
    }
    vm.io.write_char(b'\n');
}

fn handle_see(vm: &mut Vm, tz: &mut Tokenizer) {
    let name = match tz.next_token() {
        Some(n) => n,
        None => {
            vm.report(&CoreError::BadDirectiveContext("SEE"));
            return;
        }
    };
    let addr = match vm.kernel.lookup(&name) {
        Some(a) => a,
        None => {
            vm.report(&CoreError::UnknownToken(name));
            return;
        }
    };
    let index = vm
        .kernel
        .words()
        .iter()
        .rposition(|w| w.addr == addr)
        .unwrap_or(0);
    if vm.kernel.is_builtin_index(index) {
        print_line(vm, &format!("{name} : builtin"));
    } else {
        let body = image::decompile_word(vm, addr);
        print_line(vm, &format!(": {name} {body} ;"));
    }
}

fn handle_list(vm: &mut Vm) {
    let names: Vec<String> = vm.kernel.words().iter().map(|w| w.name().to_string()).collect();
    print_line(vm, &names.join(" "));
}

fn handle_load(vm: &mut Vm, tz: &mut Tokenizer) {
    let path = match tz.next_token() {
        Some(p) => p,
        None => {
            vm.report(&CoreError::BadDirectiveContext("LOAD"));
            return;
        }
    };
    match files::read_source_file(&path) {
        Ok(text) => {
            for line in text.lines() {
                interpret_line(vm, line);
                if vm.should_exit() {
                    break;
                }
            }
        }
        Err(e) => vm.report(&e),
    }
}

fn handle_save(vm: &mut Vm, tz: &mut Tokenizer) {
    let path = match tz.next_token() {
        Some(p) => p,
        None => {
            vm.report(&CoreError::BadDirectiveContext("SAVE"));
            return;
        }
    };
    let text = image::save_text(vm);
    if let Err(e) = files::write_text_file(&path, &text) {
        vm.report(&e);
    }
}

fn handle_saveb(vm: &mut Vm, tz: &mut Tokenizer) {
    let path = match tz.next_token() {
        Some(p) => p,
        None => {
            vm.report(&CoreError::BadDirectiveContext("SAVEB"));
            return;
        }
    };
    let bytes = image::save_image(vm);
    if let Err(e) = files::write_binary_file(&path, &bytes) {
        vm.report(&e);
    }
}

fn handle_loadb(vm: &mut Vm, tz: &mut Tokenizer) {
    let path = match tz.next_token() {
        Some(p) => p,
        None => {
            vm.report(&CoreError::BadDirectiveContext("LOADB"));
            return;
        }
    };
    match files::read_binary_file(&path) {
        Ok(bytes) => {
            if let Err(e) = image::load_image(vm, &bytes) {
                vm.report(&e);
            }
        }
        Err(e) => vm.report(&e),
    }
}
