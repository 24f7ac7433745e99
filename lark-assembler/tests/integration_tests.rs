//! Integration tests for the Lark-16 assembler
//!
//! Tests the complete assembly workflow including:
//! - Instruction parsing and encoding for every argument scheme
//! - Label definition, forward references and backpatching
//! - Macro definition and expansion
//! - Generated images against hand-computed encodings

use lark_assembler::assemble;
use lark_spec::{Instruction, Register};

fn encoded(instructions: &[Instruction]) -> Vec<u8> {
    instructions.iter().flat_map(|i| i.encode()).collect()
}

// ============================================================================
// Basic Assembly
// ============================================================================

#[test]
fn test_assemble_empty_program() {
    let assembly = assemble("").unwrap();
    assert!(assembly.image.is_empty());
}

#[test]
fn test_assemble_comments_only() {
    let source = "# a comment\n# another comment\n";
    let assembly = assemble(source).unwrap();
    assert!(assembly.image.is_empty());
}

#[test]
fn test_assemble_single_instruction() {
    let assembly = assemble("nop\n").unwrap();
    assert_eq!(assembly.image, encoded(&[Instruction::Nop]));
}

#[test]
fn test_assemble_multiple_instructions() {
    let source = "\
ldi %a, 1
ldi %b, 2
add %c, %a, %b
";
    let assembly = assemble(source).unwrap();
    assert_eq!(
        assembly.image,
        encoded(&[
            Instruction::Ldi { rd: Register::A, imm: 1 },
            Instruction::Ldi { rd: Register::B, imm: 2 },
            Instruction::Add { rd: Register::C, rs1: Register::A, rs2: Register::B },
        ])
    );
}

// ============================================================================
// Argument Schemes
// ============================================================================

#[test]
fn test_assemble_all_regs_scheme_ops() {
    let source = "\
add %c, %a, %b
sub %c, %a, %b
mul %c, %a, %b
div %c, %a, %b
mod %c, %a, %b
and %c, %a, %b
or %c, %a, %b
xor %c, %a, %b
shl %c, %a, %b
shr %c, %a, %b
";
    let assembly = assemble(source).unwrap();
    assert_eq!(assembly.image.len(), 40);
    // all share the operand bytes, opcodes run 0x04..=0x0d
    for (index, chunk) in assembly.image.chunks(4).enumerate() {
        assert_eq!(chunk, &[0x04 + index as u8, 0x02, 0x00, 0x01]);
    }
}

#[test]
fn test_assemble_loads_and_stores() {
    let source = "\
ldr %a, %e
ldrb %b, %e
str %e, %a
strb %e, %b
sti %a, 0x6000
stib %b, 0x6001
";
    let assembly = assemble(source).unwrap();
    assert_eq!(
        assembly.image,
        encoded(&[
            Instruction::Ldr { rd: Register::A, rs: Register::E },
            Instruction::Ldrb { rd: Register::B, rs: Register::E },
            Instruction::Str { ra: Register::E, rs: Register::A },
            Instruction::Strb { ra: Register::E, rs: Register::B },
            Instruction::Sti { rs: Register::A, addr: 0x6000 },
            Instruction::Stib { rs: Register::B, addr: 0x6001 },
        ])
    );
}

#[test]
fn test_assemble_jumps() {
    let source = "\
jmp 0x0010
jz 16
jd %sp
";
    let assembly = assemble(source).unwrap();
    assert_eq!(
        assembly.image,
        encoded(&[
            Instruction::Jmp { addr: 0x0010 },
            Instruction::Jz { addr: 16 },
            Instruction::Jd { rs: Register::Sp },
        ])
    );
}

#[test]
fn test_assemble_special_registers() {
    let assembly = assemble("add %sp, %ip, %fl\n").unwrap();
    assert_eq!(assembly.image, vec![0x04, 29, 30, 31]);
}

#[test]
fn test_assemble_sys_and_nop_take_no_arguments() {
    let assembly = assemble("nop\nsys\n").unwrap();
    assert_eq!(assembly.image, vec![0x00, 0, 0, 0, 0x15, 0, 0, 0]);
}

// ============================================================================
// Immediates
// ============================================================================

#[test]
fn test_immediate_radixes() {
    let source = "\
ldi %a, 255
ldi %a, 0xff
ldi %a, 0b11111111
";
    let assembly = assemble(source).unwrap();
    for chunk in assembly.image.chunks(4) {
        assert_eq!(chunk, &[0x01, 0x00, 0x00, 0xff]);
    }
}

#[test]
fn test_immediate_character_literal() {
    let assembly = assemble("ldi %a, '\\n'\n").unwrap();
    assert_eq!(assembly.image, vec![0x01, 0x00, 0x00, 0x0a]);
}

#[test]
fn test_immediate_negative_wraps_to_u16() {
    let assembly = assemble("ldi %a, -2\n").unwrap();
    assert_eq!(assembly.image, vec![0x01, 0x00, 0xff, 0xfe]);
}

// ============================================================================
// Labels
// ============================================================================

#[test]
fn test_label_addresses_track_output_length() {
    let source = "\
nop
.first:
nop
nop
.second:
jmp .first
jz .second
";
    let assembly = assemble(source).unwrap();

    // .first = 4, .second = 12; both already resolved when referenced
    assert_eq!(&assembly.image[12..16], &[0x0e, 0x00, 0x00, 0x04]);
    assert_eq!(&assembly.image[16..20], &[0x0f, 0x00, 0x00, 0x0c]);
}

#[test]
fn test_forward_reference_backpatched_high_byte_first() {
    // pad so the target lands past 0xff and exercises both bytes
    let mut source = String::from("jmp .end\n");
    for _ in 0..64 {
        source.push_str("nop\n");
    }
    source.push_str(".end:\nnop\n");

    let assembly = assemble(&source).unwrap();

    // .end = 4 + 64*4 = 260 = 0x0104
    assert_eq!(assembly.image[2], 0x01);
    assert_eq!(assembly.image[3], 0x04);
}

#[test]
fn test_multiple_forward_references_to_one_label() {
    let source = "\
jz .out
jmp .out
.out:
nop
";
    let assembly = assemble(source).unwrap();
    assert_eq!(&assembly.image[2..4], &[0x00, 0x08]);
    assert_eq!(&assembly.image[6..8], &[0x00, 0x08]);
}

#[test]
fn test_unresolved_label_reported_and_left_zero() {
    let assembly = assemble("jmp .missing\njz .missing\n").unwrap();
    assert_eq!(assembly.unresolved, vec!["missing".to_string()]);
    assert_eq!(&assembly.image[2..4], &[0, 0]);
    assert_eq!(&assembly.image[6..8], &[0, 0]);
}

// ============================================================================
// Macros
// ============================================================================

#[test]
fn test_macro_expansion_emits_code() {
    let source = "\
!macro inc r : add $r, $r, %f ;
ldi %f, 1
inc %a
inc %b
";
    let assembly = assemble(source).unwrap();
    assert_eq!(
        assembly.image,
        encoded(&[
            Instruction::Ldi { rd: Register::F, imm: 1 },
            Instruction::Add { rd: Register::A, rs1: Register::A, rs2: Register::F },
            Instruction::Add { rd: Register::B, rs1: Register::B, rs2: Register::F },
        ])
    );
}

#[test]
fn test_macro_with_immediate_argument() {
    let source = "\
!macro store v a : ldi %z, $v
sti %z, $a ;
store 7, 0x6000
";
    let assembly = assemble(source).unwrap();
    assert_eq!(
        assembly.image,
        encoded(&[
            Instruction::Ldi { rd: Register::Z, imm: 7 },
            Instruction::Sti { rs: Register::Z, addr: 0x6000 },
        ])
    );
}

#[test]
fn test_macro_argument_can_be_label_reference() {
    let source = "\
!macro goto t : jmp $t ;
goto .end
nop
.end:
nop
";
    let assembly = assemble(source).unwrap();
    assert!(assembly.unresolved.is_empty());
    // .end = 8, patched into the expanded jmp
    assert_eq!(&assembly.image[..4], &[0x0e, 0x00, 0x00, 0x08]);
}

#[test]
fn test_macro_spanning_multiple_lines() {
    let source = "\
!macro prologue : ldi %e, 0
ldi %f, 0
ldi %g, 0 ;
prologue
nop
";
    let assembly = assemble(source).unwrap();
    assert_eq!(assembly.image.len(), 16);
}
