//! Image persistence (C7, §6.3): binary `SAVEB`/`LOADB` and textual `SAVE`/`SEE`.
//!
//! The binary format is exact and round-trips the dictionary bit for bit.
//! The textual decompiler is necessarily lossy: `IF...THEN`, `IF...ELSE...THEN`,
//! and `BEGIN...WHILE...REPEAT` all compile down to the same two branch
//! opcodes, so reconstructing source text means guessing which surface form
//! produced a given branch pattern. The heuristic below resolves the
//! guess the same way every time (documented as an accepted open question),
//! but deeply nested loops can still come out re-indented differently than
//! they were typed.

use crate::error::{CoreError, CoreResult};
use crate::kernel::Addr;
use crate::runtime::{Op, Vm, BUILTIN_TABLE};
use std::collections::HashMap;

const MAGIC: u32 = 0x4654_5448; // "FTTH" read as a little-endian u32
const VERSION: u16 = 1;

/// Serialize the live dictionary into the on-disk image format.
pub fn save_image(vm: &Vm) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&vm.kernel.here().to_le_bytes());
    out.extend_from_slice(&(vm.kernel.word_count() as u32).to_le_bytes());
    out.extend_from_slice(&(vm.kernel.builtin_count() as u32).to_le_bytes());
    out.extend_from_slice(vm.kernel.arena_prefix());
    for w in vm.kernel.words() {
        let mut name_field = [0u8; 16];
        let bytes = w.name().as_bytes();
        name_field[..bytes.len()].copy_from_slice(bytes);
        out.extend_from_slice(&name_field);
        out.extend_from_slice(&w.addr.to_le_bytes());
        out.push(w.flags);
    }
    out
}

/// Restore a dictionary from a previously saved image. Rejects anything
/// whose magic, version, or embedded sizes don't fit the current kernel.
pub fn load_image(vm: &mut Vm, bytes: &[u8]) -> CoreResult<()> {
    if bytes.len() < 16 {
        return Err(CoreError::ImageFormat("truncated header"));
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    if magic != MAGIC {
        return Err(CoreError::ImageFormat("bad magic"));
    }
    let version = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
    if version != VERSION {
        return Err(CoreError::ImageFormat("unsupported version"));
    }
    let here = u16::from_le_bytes(bytes[6..8].try_into().unwrap());
    let word_count = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    let builtin_count = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;

    let arena_end = 16 + here as usize;
    if bytes.len() < arena_end || (here as usize) > vm.kernel.capacity() {
        return Err(CoreError::ImageFormat("arena prefix out of range"));
    }
    vm.kernel.load_arena_prefix(&bytes[16..arena_end]);

    vm.kernel.truncate_words(0);
    let mut pos = arena_end;
    for _ in 0..word_count {
        if pos + 19 > bytes.len() {
            return Err(CoreError::ImageFormat("truncated word table"));
        }
        let name_field = &bytes[pos..pos + 16];
        let end = name_field.iter().position(|&b| b == 0).unwrap_or(16);
        let name = String::from_utf8_lossy(&name_field[..end]).into_owned();
        let addr = Addr::from_le_bytes(bytes[pos + 16..pos + 18].try_into().unwrap());
        vm.kernel.add_word(&name, addr);
        pos += 19;
    }
    if builtin_count > vm.kernel.word_count() {
        return Err(CoreError::ImageFormat("builtin count exceeds word table"));
    }
    // builtin_count is trusted as recorded; Kernel tracks its own count from
    // cold start, so a loaded image's builtins are already the same prefix
    // as long as it was produced by a compatible binary.
    Ok(())
}

/// Flat token-level decompilation of one word's body, `."` included.
pub fn decompile_word(vm: &Vm, addr: Addr) -> String {
    let mut pc = addr;
    let mut out: Vec<String> = Vec::new();
    let mut pos_to_index: HashMap<Addr, usize> = HashMap::new();
    let mut if_stack: Vec<(usize, Addr)> = Vec::new();
    let mut close_at: HashMap<Addr, ()> = HashMap::new();
    let mut pending_begin: Vec<(Addr, Addr)> = Vec::new(); // (begin_addr, insert_before_output_index placeholder resolved later)

    loop {
        pos_to_index.insert(pc, out.len());

        if let Some(()) = close_at.remove(&pc) {
            if Op::from_byte(vm.kernel.read_byte(pc)) == Some(Op::Branch) {
                // this is the ELSE half: consume the Branch here ourselves.
                if_stack.pop();
                out.push("ELSE".to_string());
                let target = vm.kernel.read_addr(pc.wrapping_add(1));
                close_at.insert(target, ());
                pc = pc.wrapping_add(3);
                continue;
            } else {
                out.push("THEN".to_string());
            }
        }

        let byte = vm.kernel.read_byte(pc);
        let op = match Op::from_byte(byte) {
            Some(op) => op,
            None => break,
        };
        pc = pc.wrapping_add(1);

        match op {
            Op::Exit => break,
            Op::Lit => {
                let v = vm.kernel.read_cell(pc);
                pc = pc.wrapping_add(4);
                out.push(v.to_string());
            }
            Op::Call => {
                let target = vm.kernel.read_addr(pc);
                pc = pc.wrapping_add(2);
                out.push(name_for_addr(vm, target));
            }
            Op::Branch => {
                let target = vm.kernel.read_addr(pc);
                let after_operand = pc.wrapping_add(2);

                // The `." text"` pattern: a forward branch over raw text
                // bytes, immediately followed by LIT addr; LIT len; TYPE.
                if target > after_operand {
                    let len = (target - after_operand) as usize;
                    let tail = target;
                    if Op::from_byte(vm.kernel.read_byte(tail)) == Some(Op::Lit)
                        && vm.kernel.read_cell(tail.wrapping_add(1)) == after_operand as i32
                        && Op::from_byte(vm.kernel.read_byte(tail.wrapping_add(5))) == Some(Op::Lit)
                        && vm.kernel.read_cell(tail.wrapping_add(6)) == len as i32
                        && Op::from_byte(vm.kernel.read_byte(tail.wrapping_add(10))) == Some(Op::Type)
                    {
                        let bytes = vm.kernel.read_string(after_operand, len);
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        out.push(format!(".\" {text}\""));
                        pc = tail.wrapping_add(11);
                        continue;
                    }
                }

                pc = after_operand;
                if target <= pc {
                    if let Some((idx, _t)) = if_stack.pop() {
                        out[idx] = "WHILE".to_string();
                    }
                    out.push("REPEAT".to_string());
                    pending_begin.push((target, target));
                } else {
                    // a Branch reached outside the close_at/ELSE path with a
                    // forward target: treat defensively as an unmatched skip.
                    out.push("REPEAT".to_string());
                }
            }
            Op::BranchIfZero => {
                let target = vm.kernel.read_addr(pc);
                pc = pc.wrapping_add(2);
                if_stack.push((out.len(), target));
                out.push("IF".to_string());
                close_at.insert(target, ());
            }
            Op::Do => out.push("DO".to_string()),
            Op::Loop => {
                pc = pc.wrapping_add(2);
                out.push("LOOP".to_string());
            }
            Op::I => out.push("I".to_string()),
            _ => out.push(name_for_opcode(op)),
        }
    }

    for (begin_addr, _) in pending_begin {
        if let Some(&idx) = pos_to_index.get(&begin_addr) {
            out.insert(idx, "BEGIN".to_string());
        }
    }

    out.join(" ")
}

fn name_for_addr(vm: &Vm, addr: Addr) -> String {
    vm.kernel
        .words()
        .iter()
        .rev()
        .find(|w| w.addr == addr)
        .map(|w| w.name().to_string())
        .unwrap_or_else(|| format!("@{addr}"))
}

fn name_for_opcode(op: Op) -> String {
    BUILTIN_TABLE
        .iter()
        .find(|(_, o, _)| *o == op)
        .map(|(name, _, _)| name.to_string())
        .unwrap_or_else(|| format!("{op:?}"))
}

/// `SAVE`: a textual listing of every user-defined word (builtins excluded)
/// in definition order, suitable for `LOAD`ing back.
pub fn save_text(vm: &Vm) -> String {
    let mut lines = Vec::new();
    for i in vm.kernel.builtin_count()..vm.kernel.word_count() {
        let w = vm.kernel.word_at(i);
        let body = decompile_word(vm, w.addr);
        lines.push(format!(": {} {} ;", w.name(), body));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internals::compiler::handle_token;
    use crate::internals::io::CapturingIo;
    use crate::internals::tokenizer::Tokenizer;

    fn vm() -> Vm {
        Vm::new(Box::new(CapturingIo::new()))
    }

    fn run_line(vm: &mut Vm, line: &str) {
        let mut tz = Tokenizer::new(line);
        while let Some(tok) = tz.next_token() {
            handle_token(vm, &mut tz, &tok).unwrap();
        }
    }

    #[test]
    fn binary_image_round_trips() {
        let mut vm = vm();
        run_line(&mut vm, ": SQ DUP * ;");
        let bytes = save_image(&vm);

        let mut vm2 = vm();
        load_image(&mut vm2, &bytes).unwrap();
        assert_eq!(vm2.kernel.here(), vm.kernel.here());
        assert_eq!(vm2.kernel.word_count(), vm.kernel.word_count());
        assert_eq!(vm2.kernel.lookup("SQ"), vm.kernel.lookup("SQ"));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut vm = vm();
        let err = load_image(&mut vm, &[0u8; 16]);
        assert_eq!(err, Err(CoreError::ImageFormat("bad magic")));
    }

    #[test]
    fn decompiles_simple_definition() {
        let mut vm = vm();
        run_line(&mut vm, ": SQ DUP * ;");
        let addr = vm.kernel.lookup("SQ").unwrap();
        let text = decompile_word(&vm, addr);
        assert_eq!(text, "DUP *");
    }

    #[test]
    fn decompiles_if_then() {
        let mut vm = vm();
        run_line(&mut vm, ": ABS0 DUP 0 < IF NEGATE THEN ;");
        let addr = vm.kernel.lookup("ABS0").unwrap();
        let text = decompile_word(&vm, addr);
        assert_eq!(text, "DUP 0 < IF NEGATE THEN");
    }

    #[test]
    fn decompiles_dot_quote() {
        let mut vm = vm();
        run_line(&mut vm, ": GREET .\" hi there\" ;");
        let addr = vm.kernel.lookup("GREET").unwrap();
        let text = decompile_word(&vm, addr);
        assert_eq!(text, ".\" hi there\"");
    }

    #[test]
    fn save_text_lists_user_words_only() {
        let mut vm = vm();
        run_line(&mut vm, ": SQ DUP * ;");
        let text = save_text(&vm);
        assert_eq!(text, ": SQ DUP * ;");
    }
}
