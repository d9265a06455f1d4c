//! Directive-driven compiler (C4, §4.3).
//!
//! Tokens are handled one at a time. Most words either run immediately
//! (outside a definition) or compile to a `CALL` (inside one); the
//! structured-flow words below are intercepted before dictionary lookup and
//! instead push/pop backpatch addresses on the kernel's compile-time control
//! stack. A directive used in the wrong context (e.g. `THEN` with no open
//! `IF`) aborts the current line with `CoreError::BadDirectiveContext`.

use crate::error::{CoreError, CoreResult};
use crate::internals::inner;
use crate::internals::tokenizer::Tokenizer;
use crate::kernel::Addr;
use crate::runtime::Op;
use crate::runtime::Vm;

/// Try to parse a token as a signed decimal cell literal.
fn parse_number(token: &str) -> Option<i32> {
    token.parse::<i32>().ok()
}

fn emit_byte(vm: &mut Vm, b: u8) -> CoreResult<()> {
    if vm.kernel.emit_byte(b) {
        Ok(())
    } else {
        Err(CoreError::CapacityExhausted("arena"))
    }
}

fn emit_cell(vm: &mut Vm, v: i32) -> CoreResult<()> {
    if vm.kernel.emit_cell(v) {
        Ok(())
    } else {
        Err(CoreError::CapacityExhausted("arena"))
    }
}

fn emit_addr(vm: &mut Vm, a: Addr) -> CoreResult<()> {
    if vm.kernel.emit_addr(a) {
        Ok(())
    } else {
        Err(CoreError::CapacityExhausted("arena"))
    }
}

fn control_push(vm: &mut Vm, addr: Addr) -> CoreResult<()> {
    if vm.kernel.control_push(addr) {
        Ok(())
    } else {
        Err(CoreError::CapacityExhausted("control stack"))
    }
}

fn control_pop(vm: &mut Vm, who: &'static str) -> CoreResult<Addr> {
    vm.kernel.control_pop().ok_or(CoreError::BadDirectiveContext(who))
}

/// Handle one token read from `tz`, which is how `."` gets at the raw
/// (non-uppercased, non-split) remainder of the line for its string body.
pub fn handle_token(vm: &mut Vm, tz: &mut Tokenizer, token: &str) -> CoreResult<()> {
    match token {
        ":" => start_definition(vm, tz),
        ";" => end_definition(vm),
        "IF" => compile_if(vm),
        "ELSE" => compile_else(vm),
        "THEN" => compile_then(vm),
        "DO" => compile_do(vm),
        "LOOP" => compile_loop(vm),
        "BEGIN" => compile_begin(vm),
        "WHILE" => compile_while(vm),
        "REPEAT" => compile_repeat(vm),
        ".\"" => compile_dot_quote(vm, tz),
        "CONSTANT" => define_constant(vm, tz),
        "VARIABLE" => define_variable(vm, tz),
        _ => compile_or_run_word(vm, token),
    }
}

fn require_compiling(vm: &Vm, who: &'static str) -> CoreResult<()> {
    if vm.compiling {
        Ok(())
    } else {
        Err(CoreError::BadDirectiveContext(who))
    }
}

fn require_not_compiling(vm: &Vm, who: &'static str) -> CoreResult<()> {
    if vm.compiling {
        Err(CoreError::BadDirectiveContext(who))
    } else {
        Ok(())
    }
}

fn next_name(tz: &mut Tokenizer, who: &'static str) -> CoreResult<String> {
    tz.next_token().ok_or(CoreError::BadDirectiveContext(who))
}

fn start_definition(vm: &mut Vm, tz: &mut Tokenizer) -> CoreResult<()> {
    require_not_compiling(vm, ":")?;
    let name = next_name(tz, ":")?;
    let addr = vm.kernel.here();
    vm.kernel.add_word(&name, addr);
    vm.defining_name = Some(name);
    vm.compiling = true;
    Ok(())
}

fn end_definition(vm: &mut Vm) -> CoreResult<()> {
    require_compiling(vm, ";")?;
    if !vm.kernel.control_is_empty() {
        vm.kernel.control_clear();
        return Err(CoreError::BadDirectiveContext(";"));
    }
    emit_byte(vm, Op::Exit.as_byte())?;
    vm.compiling = false;
    vm.defining_name = None;
    Ok(())
}

fn compile_if(vm: &mut Vm) -> CoreResult<()> {
    require_compiling(vm, "IF")?;
    emit_byte(vm, Op::BranchIfZero.as_byte())?;
    let patch_at = vm.kernel.here();
    emit_addr(vm, 0)?;
    control_push(vm, patch_at)
}

fn compile_else(vm: &mut Vm) -> CoreResult<()> {
    require_compiling(vm, "ELSE")?;
    let if_patch = control_pop(vm, "ELSE")?;
    emit_byte(vm, Op::Branch.as_byte())?;
    let else_patch = vm.kernel.here();
    emit_addr(vm, 0)?;
    vm.kernel.patch_addr(if_patch, vm.kernel.here());
    control_push(vm, else_patch)
}

fn compile_then(vm: &mut Vm) -> CoreResult<()> {
    require_compiling(vm, "THEN")?;
    let patch_at = control_pop(vm, "THEN")?;
    vm.kernel.patch_addr(patch_at, vm.kernel.here());
    Ok(())
}

fn compile_do(vm: &mut Vm) -> CoreResult<()> {
    require_compiling(vm, "DO")?;
    emit_byte(vm, Op::Do.as_byte())?;
    control_push(vm, vm.kernel.here())
}

fn compile_loop(vm: &mut Vm) -> CoreResult<()> {
    require_compiling(vm, "LOOP")?;
    let loop_start = control_pop(vm, "LOOP")?;
    emit_byte(vm, Op::Loop.as_byte())?;
    emit_addr(vm, loop_start)
}

fn compile_begin(vm: &mut Vm) -> CoreResult<()> {
    require_compiling(vm, "BEGIN")?;
    control_push(vm, vm.kernel.here())
}

fn compile_while(vm: &mut Vm) -> CoreResult<()> {
    require_compiling(vm, "WHILE")?;
    emit_byte(vm, Op::BranchIfZero.as_byte())?;
    let patch_at = vm.kernel.here();
    emit_addr(vm, 0)?;
    control_push(vm, patch_at)
}

fn compile_repeat(vm: &mut Vm) -> CoreResult<()> {
    require_compiling(vm, "REPEAT")?;
    let exit_patch = control_pop(vm, "REPEAT")?;
    let loop_start = control_pop(vm, "REPEAT")?;
    emit_byte(vm, Op::Branch.as_byte())?;
    emit_addr(vm, loop_start)?;
    vm.kernel.patch_addr(exit_patch, vm.kernel.here());
    Ok(())
}

/// Compiles `." text"` as a branch around the raw text bytes (stored inline
/// in the arena), followed by `LIT <addr>; LIT <len>; TYPE` to print them:
/// `BRANCH PSKIP; <bytes>; PSKIP: LIT addr; LIT len; TYPE`.
fn compile_dot_quote(vm: &mut Vm, tz: &mut Tokenizer) -> CoreResult<()> {
    require_compiling(vm, ".\"")?;
    let text = tz.read_string_literal()?;
    emit_byte(vm, Op::Branch.as_byte())?;
    let skip_patch = vm.kernel.here();
    emit_addr(vm, 0)?;
    let str_addr = vm.kernel.here();
    for b in text.bytes() {
        emit_byte(vm, b)?;
    }
    vm.kernel.patch_addr(skip_patch, vm.kernel.here());
    emit_byte(vm, Op::Lit.as_byte())?;
    emit_cell(vm, str_addr as i32)?;
    emit_byte(vm, Op::Lit.as_byte())?;
    emit_cell(vm, text.len() as i32)?;
    emit_byte(vm, Op::Type.as_byte())?;
    Ok(())
}

fn define_constant(vm: &mut Vm, tz: &mut Tokenizer) -> CoreResult<()> {
    require_not_compiling(vm, "CONSTANT")?;
    let name = next_name(tz, "CONSTANT")?;
    let value = vm.kernel.pop();
    let addr = vm.kernel.here();
    emit_byte(vm, Op::Lit.as_byte())?;
    emit_cell(vm, value)?;
    emit_byte(vm, Op::Exit.as_byte())?;
    vm.kernel.add_word(&name, addr);
    Ok(())
}

fn define_variable(vm: &mut Vm, tz: &mut Tokenizer) -> CoreResult<()> {
    require_not_compiling(vm, "VARIABLE")?;
    let name = next_name(tz, "VARIABLE")?;
    let storage = vm.kernel.here();
    if !vm.kernel.reserve(4) {
        return Err(CoreError::CapacityExhausted("arena"));
    }
    let addr = vm.kernel.here();
    emit_byte(vm, Op::Lit.as_byte())?;
    emit_cell(vm, storage as i32)?;
    emit_byte(vm, Op::Exit.as_byte())?;
    vm.kernel.add_word(&name, addr);
    Ok(())
}

/// A plain number or word token: compiled as `LIT`/`CALL` while defining a
/// word, executed immediately otherwise. `I` is special-cased to its bare
/// opcode byte rather than `CALL`, since calling through it would push an
/// extra return-stack frame between the active loop frame and `I`'s read of
/// the return-stack top.
fn compile_or_run_word(vm: &mut Vm, token: &str) -> CoreResult<()> {
    if let Some(n) = parse_number(token) {
        if vm.compiling {
            emit_byte(vm, Op::Lit.as_byte())?;
            emit_cell(vm, n)?;
        } else {
            vm.kernel.push(n);
        }
        return Ok(());
    }

    match vm.kernel.lookup(token) {
        Some(addr) => {
            if vm.compiling {
                if token == "I" {
                    emit_byte(vm, Op::I.as_byte())?;
                } else {
                    emit_byte(vm, Op::Call.as_byte())?;
                    emit_addr(vm, addr)?;
                }
            } else {
                inner::execute(vm, addr);
            }
            Ok(())
        }
        None => Err(CoreError::UnknownToken(token.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internals::io::CapturingIo;

    fn vm() -> Vm {
        Vm::new(Box::new(CapturingIo::new()))
    }

    fn run_line(vm: &mut Vm, line: &str) -> CoreResult<()> {
        let mut tz = Tokenizer::new(line);
        while let Some(tok) = tz.next_token() {
            handle_token(vm, &mut tz, &tok)?;
        }
        Ok(())
    }

    #[test]
    fn immediate_arithmetic_pushes_result() {
        let mut vm = vm();
        run_line(&mut vm, "3 4 +").unwrap();
        assert_eq!(vm.pop(), 7);
    }

    #[test]
    fn defines_and_calls_a_word() {
        let mut vm = vm();
        run_line(&mut vm, ": SQ DUP * ;").unwrap();
        run_line(&mut vm, "5 SQ").unwrap();
        assert_eq!(vm.pop(), 25);
    }

    #[test]
    fn if_else_then_selects_branch() {
        let mut vm = vm();
        run_line(&mut vm, ": SIGN DUP 0 > IF DROP 1 ELSE 0 < IF 1 ELSE 0 THEN THEN ;").unwrap();
        run_line(&mut vm, "-5 SIGN").unwrap();
        assert_eq!(vm.pop(), 1);
        run_line(&mut vm, "7 SIGN").unwrap();
        assert_eq!(vm.pop(), 1);
        run_line(&mut vm, "0 SIGN").unwrap();
        assert_eq!(vm.pop(), 0);
    }

    #[test]
    fn counted_loop_accumulates() {
        let mut vm = vm();
        run_line(&mut vm, ": SUMTO 0 SWAP 0 DO I + LOOP ;").unwrap();
        run_line(&mut vm, "5 SUMTO").unwrap();
        assert_eq!(vm.pop(), 0 + 1 + 2 + 3 + 4);
    }

    #[test]
    fn begin_while_repeat_counts_down() {
        let mut vm = vm();
        run_line(&mut vm, ": COUNTDOWN BEGIN DUP 0 > WHILE DUP 1 - REPEAT ;").unwrap();
        run_line(&mut vm, "3 COUNTDOWN").unwrap();
        // leaves 3 2 1 0 on the stack
        assert_eq!(vm.pop(), 0);
        assert_eq!(vm.pop(), 1);
        assert_eq!(vm.pop(), 2);
        assert_eq!(vm.pop(), 3);
    }

    #[test]
    fn constant_and_variable() {
        let mut vm = vm();
        run_line(&mut vm, "42 CONSTANT ANSWER").unwrap();
        run_line(&mut vm, "ANSWER").unwrap();
        assert_eq!(vm.pop(), 42);

        run_line(&mut vm, "VARIABLE V").unwrap();
        run_line(&mut vm, "9 V !").unwrap();
        run_line(&mut vm, "V @").unwrap();
        assert_eq!(vm.pop(), 9);
    }

    #[test]
    fn dot_quote_compiles_and_emits_without_error() {
        let mut vm = vm();
        run_line(&mut vm, ": GREET .\" hi\" ;").unwrap();
        assert!(run_line(&mut vm, "GREET").is_ok());
    }

    #[test]
    fn then_without_open_if_is_a_bad_directive_context() {
        let mut vm = vm();
        vm.compiling = true;
        let err = handle_token(&mut vm, &mut Tokenizer::new(""), "THEN");
        assert_eq!(err, Err(CoreError::BadDirectiveContext("THEN")));
    }

    #[test]
    fn unknown_token_is_reported() {
        let mut vm = vm();
        let err = run_line(&mut vm, "NOSUCHWORD");
        assert_eq!(err, Err(CoreError::UnknownToken("NOSUCHWORD".to_string())));
    }
}
