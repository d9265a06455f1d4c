//! End-to-end scenarios driven through the public `Vm`/outer-interpreter
//! surface, mirroring the worked examples a user would type at the prompt.

use ftth::internals::io::CapturingIo;
use ftth::internals::outer::interpret_line;
use ftth::Vm;

fn vm() -> Vm {
    Vm::new(Box::new(CapturingIo::new()))
}

fn output(vm: &Vm) -> String {
    vm.io
        .as_any()
        .downcast_ref::<CapturingIo>()
        .expect("test VMs always use CapturingIo")
        .output_string()
}

fn run(vm: &mut Vm, source: &str) {
    for line in source.lines() {
        interpret_line(vm, line);
    }
}

#[test]
fn addition_and_print() {
    let mut vm = vm();
    run(&mut vm, "3 4 + .");
    assert_eq!(output(&vm), "7 ");
    assert_eq!(vm.kernel.sp(), 0);
}

#[test]
fn square_word_definition() {
    let mut vm = vm();
    run(&mut vm, ": SQ DUP * ; 5 SQ .");
    assert_eq!(output(&vm), "25 ");
    assert_eq!(vm.kernel.sp(), 0);
}

#[test]
fn countdown_uses_do_loop_and_i() {
    let mut vm = vm();
    run(&mut vm, ": COUNTDOWN 0 DO I . LOOP ; 5 COUNTDOWN");
    assert_eq!(output(&vm), "0 1 2 3 4 ");
    assert_eq!(vm.kernel.sp(), 0);
}

#[test]
fn factorial_is_recursive_if_else_then() {
    let mut vm = vm();
    run(
        &mut vm,
        ": FACT DUP 1 > IF DUP 1 - FACT * ELSE DROP 1 THEN ; 10 FACT .",
    );
    assert_eq!(output(&vm), "3628800 ");
    assert_eq!(vm.kernel.sp(), 0);
}

#[test]
fn variable_and_fetch_store_bump_counter() {
    let mut vm = vm();
    run(
        &mut vm,
        "VARIABLE C 0 C ! : BUMP C @ 1 + C ! ; BUMP BUMP BUMP C @ .",
    );
    assert_eq!(output(&vm), "3 ");
    assert_eq!(vm.kernel.sp(), 0);
}

#[test]
fn gcd_is_recursive_euclid() {
    let mut vm = vm();
    run(
        &mut vm,
        ": GCD DUP 0= IF DROP ELSE SWAP OVER MOD GCD THEN ; 48 18 GCD .",
    );
    assert_eq!(output(&vm), "6 ");
    assert_eq!(vm.kernel.sp(), 0);
}

#[test]
fn call_return_balance_after_deep_recursion() {
    let mut vm = vm();
    run(&mut vm, ": FACT DUP 1 > IF DUP 1 - FACT * ELSE DROP 1 THEN ; 12 FACT DROP");
    assert_eq!(vm.kernel.rp(), 0);
}

#[test]
fn number_parse_is_idempotent_immediate_and_compiled() {
    let mut vm_immediate = vm();
    run(&mut vm_immediate, "42");
    assert_eq!(vm_immediate.kernel.peek(0), 42);

    let mut vm_compiled = vm();
    run(&mut vm_compiled, ": FORTYTWO 42 ; FORTYTWO");
    assert_eq!(vm_compiled.kernel.peek(0), 42);
}

#[test]
fn lookup_is_case_insensitive_for_user_words() {
    let mut vm = vm();
    run(&mut vm, ": Greet 1 ; greet GREET GrEeT");
    assert_eq!(vm.kernel.sp(), 3);
    assert_eq!(vm.kernel.peek(0), 1);
}

#[test]
fn comparisons_normalize_to_true_or_false() {
    let mut vm = vm();
    run(&mut vm, "3 4 < 4 3 < 3 3 =");
    assert_eq!(vm.kernel.peek(0), -1); // 3 = 3
    assert_eq!(vm.kernel.peek(1), 0); // 4 < 3
    assert_eq!(vm.kernel.peek(2), -1); // 3 < 4
}

#[test]
fn binary_image_round_trip_preserves_behavior() {
    let mut original = vm();
    run(&mut original, ": SQ DUP * ;");
    let bytes = ftth::internals::image::save_image(&original);

    let mut restored = vm();
    ftth::internals::image::load_image(&mut restored, &bytes).unwrap();
    assert_eq!(restored.kernel.here(), original.kernel.here());
    assert_eq!(restored.kernel.word_count(), original.kernel.word_count());

    run(&mut restored, "6 SQ .");
    assert_eq!(output(&restored), "36 ");
}
