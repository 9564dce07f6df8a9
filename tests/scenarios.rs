//! End-to-end assemble → link → simulate scenarios (§8 "Concrete
//! scenarios").

use m20_sim::{Processor, StopReason};

fn build(sources: &[&str]) -> m20_obj::Executable {
    let objects: Vec<_> = sources
        .iter()
        .map(|s| m20_asm::assemble(s).expect("source assembles cleanly"))
        .collect();
    m20_link::link(objects).expect("objects link cleanly")
}

#[test]
fn s1_mov_then_halt() {
    let source = "section .text\nentry main\nmain: mov r0, #5\nhalt\n";
    let object = m20_asm::assemble(source).unwrap();
    assert_eq!(object.code.len(), 8);

    let exe = m20_link::link(vec![object]).unwrap();
    let mut processor = Processor::with_default_memory();
    processor.load_executable(&exe).unwrap();
    let stop = processor.run();

    assert_eq!(stop, StopReason::Halted);
    assert_eq!(processor.registers().read(0), Ok(5));
    assert_eq!(processor.instructions_executed(), 2);
}

#[test]
fn s2_accumulate_to_two() {
    let source = "section .text\nentry main\nmain: mov r0, #0\nadd r0, r0, #1\nadd r0, r0, r0\nhalt\n";
    let exe = build(&[source]);

    let mut processor = Processor::with_default_memory();
    processor.load_executable(&exe).unwrap();
    let stop = processor.run();

    assert_eq!(stop, StopReason::Halted);
    assert_eq!(processor.registers().read(0), Ok(2));
}

#[test]
fn s4_branch_to_an_extern_symbol_resolves_across_files() {
    let definer = "section .text\nglobal target\ntarget: mov r0, #9\nhalt\n";
    let caller = "section .text\nentry start\nextern target\nstart: b target\n";

    let objects = vec![
        m20_asm::assemble(caller).unwrap(),
        m20_asm::assemble(definer).unwrap(),
    ];
    let exe = m20_link::link(objects).unwrap();

    let mut processor = Processor::with_default_memory();
    processor.load_executable(&exe).unwrap();
    let stop = processor.run();

    assert_eq!(stop, StopReason::Halted);
    assert_eq!(processor.registers().read(0), Ok(9));
}

#[test]
fn unresolved_extern_symbol_fails_to_link() {
    let caller = "section .text\nentry start\nextern missing\nstart: b missing\n";
    let object = m20_asm::assemble(caller).unwrap();
    assert!(m20_link::link(vec![object]).is_err());
}
