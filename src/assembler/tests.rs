// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::{assemble, AsmErrorKind, AssemblerOptions, Assembly, Severity};
use crate::core::assembler::error::AsmRunError;
use crate::core::cpu::CpuKind;
use crate::core::loader::MemoryLoader;

fn source(lines: &[&str]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn assemble_with(
    cpu: CpuKind,
    lines: &[&str],
    options: &AssemblerOptions,
) -> Result<Assembly, AsmRunError> {
    let loader = MemoryLoader::new().with_file("main.asm", source(lines));
    assemble(cpu, "main.asm", &loader, options)
}

fn assemble_ok(cpu: CpuKind, lines: &[&str]) -> Assembly {
    match assemble_with(cpu, lines, &AssemblerOptions::default()) {
        Ok(assembly) => assembly,
        Err(err) => panic!(
            "assembly failed: {err}: {:?}",
            err.diagnostics()
                .iter()
                .map(|d| d.format())
                .collect::<Vec<_>>()
        ),
    }
}

fn image(cpu: CpuKind, lines: &[&str]) -> (u32, Vec<u8>) {
    assemble_ok(cpu, lines).image.expect("emitted bytes")
}

fn bytes(cpu: CpuKind, lines: &[&str]) -> Vec<u8> {
    image(cpu, lines).1
}

fn assemble_err(cpu: CpuKind, lines: &[&str]) -> AsmRunError {
    assemble_with(cpu, lines, &AssemblerOptions::default())
        .err()
        .expect("assembly should fail")
}

/// Assemble each line on its own and compare the bytes.
fn assert_encodings(cpu: CpuKind, cases: &[(&str, Vec<u8>)]) {
    for (line, expected) in cases {
        let code = format!("        {line}");
        assert_eq!(&bytes(cpu, &[code.as_str()]), expected, "{line}");
    }
}

#[test]
fn straight_line_code_takes_one_pass() {
    let assembly = assemble_ok(
        CpuKind::M6502,
        &[
            "        .org $1000",
            "start   lda #$01",
            "        sta $d020",
            "        rts",
        ],
    );
    assert_eq!(assembly.report.passes(), 1);
    assert_eq!(
        assembly.image,
        Some((0x1000, vec![0xA9, 0x01, 0x8D, 0x20, 0xD0, 0x60]))
    );
}

#[test]
fn forward_branch_settles_on_second_pass() {
    let assembly = assemble_ok(
        CpuKind::M6502,
        &[
            "        .org $0800",
            "        bne skip",
            "        nop",
            "skip    rts",
        ],
    );
    assert_eq!(assembly.report.passes(), 2);
    assert_eq!(assembly.image, Some((0x0800, vec![0xD0, 0x01, 0xEA, 0x60])));
}

#[test]
fn zero_page_operand_uses_short_form_unless_forced() {
    assert_eq!(bytes(CpuKind::M6502, &["        lda $20"]), vec![0xA5, 0x20]);
    assert_eq!(
        bytes(CpuKind::M6502, &["        lda.w $20"]),
        vec![0xAD, 0x20, 0x00]
    );
}

#[test]
fn forward_zero_page_constant_shrinks_the_instruction() {
    let assembly = assemble_ok(
        CpuKind::M6502,
        &["        .org $1000", "        lda zp", "        rts", "zp = $20"],
    );
    assert_eq!(assembly.report.passes(), 2);
    assert_eq!(assembly.image, Some((0x1000, vec![0xA5, 0x20, 0x60])));
}

#[test]
fn oscillating_program_hits_pass_ceiling() {
    let err = assemble_with(
        CpuKind::M6502,
        &[
            "        .org $1000",
            "        .if finish == $1000",
            "        nop",
            "        .endif",
            "finish  rts",
        ],
        &AssemblerOptions::default(),
    )
    .err()
    .expect("cyclic program");
    assert_eq!(err.error().kind(), AsmErrorKind::TooManyPasses);
}

#[test]
fn constants_cannot_be_redefined_but_variables_can() {
    let assembly = assemble_ok(
        CpuKind::M6502,
        &["count := 1", "count := count + 1", "count += 3", "        .byte count"],
    );
    assert_eq!(assembly.image.expect("bytes").1, vec![5]);

    let err = assemble_with(
        CpuKind::M6502,
        &["value = 1", "value = 2", "        .byte value"],
        &AssemblerOptions::default(),
    )
    .err()
    .expect("redefinition");
    assert_eq!(err.error().kind(), AsmErrorKind::SymbolRedefinition);
    let diag = &err.diagnostics()[0];
    assert_eq!(diag.line(), 2);
    assert_eq!(diag.severity(), Severity::Error);
}

#[test]
fn errors_suppress_output() {
    let err = assemble_with(
        CpuKind::M6502,
        &["        .org $1000", "        lda #$100", "        rts"],
        &AssemblerOptions::default(),
    )
    .err()
    .expect("immediate out of range");
    assert_eq!(err.error().kind(), AsmErrorKind::IllegalQuantity);
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(err.diagnostics()[0].line(), 2);
    assert_eq!(err.diagnostics()[0].file(), Some("main.asm"));
}

#[test]
fn unknown_symbol_is_reported_after_first_pass() {
    let err = assemble_with(
        CpuKind::M6502,
        &["        jmp nowhere"],
        &AssemblerOptions::default(),
    )
    .err()
    .expect("undefined symbol");
    assert_eq!(err.error().kind(), AsmErrorKind::SymbolNotFound);
}

#[test]
fn cheap_locals_belong_to_the_preceding_label() {
    let assembly = assemble_ok(
        CpuKind::M6502,
        &[
            "        .org $1000",
            "first   ldx #2",
            "_loop   dex",
            "        bne _loop",
            "second  ldx #3",
            "_loop   dex",
            "        bne _loop",
            "        rts",
        ],
    );
    assert_eq!(assembly.report.passes(), 1);
    assert_eq!(
        assembly.image.expect("bytes").1,
        vec![0xA2, 0x02, 0xCA, 0xD0, 0xFD, 0xA2, 0x03, 0xCA, 0xD0, 0xFD, 0x60]
    );
    assert!(assembly.symbols.iter().any(|s| s.name == "first._loop"));
}

#[test]
fn anonymous_labels_resolve_in_both_directions() {
    assert_eq!(
        bytes(
            CpuKind::M6502,
            &[
                "        .org $2000",
                "-       dex",
                "        bne -",
                "        beq +",
                "        nop",
                "+       rts",
            ],
        ),
        vec![0xCA, 0xD0, 0xFD, 0xF0, 0x01, 0xEA, 0x60]
    );
}

#[test]
fn data_directives_follow_cpu_byte_order() {
    assert_eq!(
        bytes(CpuKind::M6502, &["        .word $1234", "        .long $010203"]),
        vec![0x34, 0x12, 0x03, 0x02, 0x01]
    );
    assert_eq!(
        bytes(CpuKind::M6809, &["        .word $1234", "        .dword 1"]),
        vec![0x12, 0x34, 0x00, 0x00, 0x00, 0x01]
    );
    assert_eq!(
        bytes(CpuKind::M6502, &["        .cstring \"HI\"", "        .byte [1, 2]"]),
        vec![b'H', b'I', 0, 1, 2]
    );
}

#[test]
fn fill_and_storage_directives_advance_the_counter() {
    let assembly = assemble_ok(
        CpuKind::M6502,
        &[
            "        .org $1000",
            "        .fill 3, $ea",
            "        .ds 2",
            "after   rts",
        ],
    );
    let after = assembly
        .symbols
        .iter()
        .find(|s| s.name == "after")
        .expect("label");
    assert_eq!(after.value.as_i64(), Some(0x1005));
    let (start, bytes) = assembly.image.expect("bytes");
    assert_eq!(start, 0x1000);
    assert_eq!(&bytes[..3], &[0xEA, 0xEA, 0xEA]);
    assert_eq!(bytes[5], 0x60);
}

#[test]
fn statement_functions_and_lambdas() {
    assert_eq!(
        bytes(
            CpuKind::M6502,
            &[
                ".function double(x)",
                "        .return x * 2",
                ".endfunction",
                "sq = (n) => n * n",
                "        .byte double(3), double(double(2)), sq(4)",
            ],
        ),
        vec![6, 8, 16]
    );
}

#[test]
fn functions_must_be_defined_before_use() {
    let err = assemble_with(
        CpuKind::M6502,
        &[
            "        .byte twice(2)",
            ".function twice(x)",
            "        .return x * 2",
            ".endfunction",
        ],
        &AssemblerOptions::default(),
    )
    .err()
    .expect("forward function reference");
    assert_eq!(err.error().kind(), AsmErrorKind::Directive);
}

#[test]
fn code_in_a_function_body_is_rejected() {
    let err = assemble_with(
        CpuKind::M6502,
        &[
            ".function noisy()",
            "        nop",
            "        .return 1",
            ".endfunction",
            "        .byte noisy()",
        ],
        &AssemblerOptions::default(),
    )
    .err()
    .expect("instruction in function");
    assert_eq!(err.error().kind(), AsmErrorKind::Directive);
}

#[test]
fn enums_count_up_from_the_last_value() {
    assert_eq!(
        bytes(
            CpuKind::M6502,
            &[
                ".enum color",
                "black",
                "white",
                "red = 5",
                "cyan",
                ".endenum",
                "        .byte color.black, color.white, color.red, color.cyan",
            ],
        ),
        vec![0, 1, 5, 6]
    );
}

#[test]
fn namespaces_qualify_their_members() {
    let assembly = assemble_ok(
        CpuKind::M6502,
        &[
            ".namespace io",
            "border = $d020",
            ".endnamespace",
            "        .org $1000",
            "        sta io.border",
        ],
    );
    assert_eq!(
        assembly.image,
        Some((0x1000, vec![0x8D, 0x20, 0xD0]))
    );
    assert!(assembly.symbols.iter().any(|s| s.name == "io.border"));
}

#[test]
fn conditionals_see_defines() {
    let lines = [
        "        .if DEBUG",
        "        .byte 1",
        "        .else",
        "        .byte 2",
        "        .endif",
    ];
    let options = AssemblerOptions {
        defines: vec![("DEBUG".to_string(), 1)],
        ..AssemblerOptions::default()
    };
    let assembly = assemble_with(CpuKind::M6502, &lines, &options).expect("assemble");
    assert_eq!(assembly.image.expect("bytes").1, vec![1]);

    let options = AssemblerOptions {
        defines: vec![("DEBUG".to_string(), 0)],
        ..AssemblerOptions::default()
    };
    let assembly = assemble_with(CpuKind::M6502, &lines, &options).expect("assemble");
    assert_eq!(assembly.image.expect("bytes").1, vec![2]);
}

#[test]
fn relocated_code_uses_logical_addresses() {
    assert_eq!(
        image(
            CpuKind::M6502,
            &[
                "        .org $1000",
                "        .relocate $c000",
                "here    jmp here",
                "        .endrelocate",
            ],
        ),
        (0x1000, vec![0x4C, 0x00, 0xC0])
    );
}

#[test]
fn binary_and_include_read_through_the_loader() {
    let loader = MemoryLoader::new()
        .with_file(
            "main.asm",
            source(&[
                "        .include \"defs.inc\"",
                "        .byte LIMIT",
                "        .binary \"data.bin\", 1, 2",
            ]),
        )
        .with_file("defs.inc", source(&["LIMIT = 7"]))
        .with_file("data.bin", vec![1u8, 2, 3, 4]);
    let assembly =
        assemble(CpuKind::M6502, "main.asm", &loader, &AssemblerOptions::default()).expect("assemble");
    assert_eq!(assembly.image.expect("bytes").1, vec![7, 2, 3]);
}

#[test]
fn warnings_echoes_and_promotion() {
    let lines = [
        "        .echo \"value \", 40 + 2",
        "        .warn \"careful\"",
        "        .byte 0",
    ];
    let assembly = assemble_with(CpuKind::M6502, &lines, &AssemblerOptions::default())
        .expect("assemble");
    assert_eq!(assembly.echoes, vec!["value 42".to_string()]);
    assert_eq!(assembly.report.warning_count(), 1);

    let options = AssemblerOptions {
        warnings_as_errors: true,
        ..AssemblerOptions::default()
    };
    let err = assemble_with(CpuKind::M6502, &lines, &options)
        .err()
        .expect("warning promoted");
    assert_eq!(err.error().kind(), AsmErrorKind::User);
}

#[test]
fn failed_assertion_is_an_error() {
    let ok = assemble_with(
        CpuKind::M6502,
        &["start   .org $1000", "        .assert start == $1000, \"moved\""],
        &AssemblerOptions::default(),
    );
    assert!(ok.is_ok());

    let err = assemble_with(
        CpuKind::M6502,
        &["        .assert 1 > 2, \"impossible\""],
        &AssemblerOptions::default(),
    )
    .err()
    .expect("assertion");
    assert_eq!(err.diagnostics()[0].error().message(), "impossible");
}

#[test]
fn unreferenced_symbols_warn_when_asked() {
    let options = AssemblerOptions {
        warn_unreferenced: true,
        ..AssemblerOptions::default()
    };
    let assembly = assemble_with(
        CpuKind::M6502,
        &["unused = 5", "used = 6", "        .byte used"],
        &options,
    )
    .expect("assemble");
    let warnings: Vec<_> = assembly
        .report
        .diagnostics()
        .iter()
        .filter(|d| d.severity() == Severity::Warning)
        .map(|d| d.error().message().to_string())
        .collect();
    assert_eq!(warnings, vec!["Symbol is never used: unused".to_string()]);
}

#[test]
fn z80_program_assembles() {
    assert_eq!(
        image(
            CpuKind::Z80,
            &[
                "        .org $8000",
                "        ld a, $10",
                "        ld hl, $1234",
                "        jr done",
                "done    ret",
            ],
        ),
        (0x8000, vec![0x3E, 0x10, 0x21, 0x34, 0x12, 0x18, 0x00, 0xC9])
    );
}

#[test]
fn m6809_program_assembles() {
    assert_eq!(
        image(
            CpuKind::M6809,
            &[
                "        .org $4000",
                "        lda #$12",
                "        ldx #$1234",
                "        sta ,x",
                "        bra done",
                "done    rts",
            ],
        ),
        (
            0x4000,
            vec![0x86, 0x12, 0x8E, 0x12, 0x34, 0xA7, 0x84, 0x20, 0x00, 0x39]
        )
    );
}

#[test]
fn unknown_mnemonic_is_a_syntax_error() {
    let err = assemble_with(
        CpuKind::M6502,
        &["        frob $20"],
        &AssemblerOptions::default(),
    )
    .err()
    .expect("unknown mnemonic");
    assert_eq!(err.error().kind(), AsmErrorKind::Syntax);
}

#[test]
fn branch_out_of_range_fails_on_the_final_pass() {
    let err = assemble_err(
        CpuKind::M6502,
        &[
            "        .org $1000",
            "        bne far",
            "        .fill 200, 0",
            "far     rts",
        ],
    );
    assert_eq!(err.error().kind(), AsmErrorKind::IllegalQuantity);
    let diag = &err.diagnostics()[0];
    assert_eq!(diag.line(), 2);
    assert_eq!(diag.error().message(), "Relative branch out of range: 200");

    let err = assemble_err(
        CpuKind::M6502,
        &["back    .fill 200, 0", "        beq back"],
    );
    assert_eq!(
        err.diagnostics()[0].error().message(),
        "Relative branch out of range: -202"
    );
}

#[test]
fn missing_operand_form_is_mode_not_supported() {
    let err = assemble_err(CpuKind::M6502, &["        sta #$10"]);
    assert_eq!(err.error().kind(), AsmErrorKind::ModeNotSupported);
    let err = assemble_err(CpuKind::M6502, &["        stx $1234,y"]);
    assert_eq!(err.error().kind(), AsmErrorKind::ModeNotSupported);
    let err = assemble_err(CpuKind::I8080, &["        ld ix, $1234"]);
    assert_eq!(err.error().kind(), AsmErrorKind::ModeNotSupported);
}

#[test]
fn parenthesized_address_falls_back_only_outside_zero_page() {
    assert_eq!(bytes(CpuKind::M6502, &["        lda ($1234)"]), vec![0xAD, 0x34, 0x12]);
    assert_eq!(bytes(CpuKind::M6502, &["        jmp ($20)"]), vec![0x6C, 0x20, 0x00]);
    assert_eq!(bytes(CpuKind::W65C02, &["        lda ($20)"]), vec![0xB2, 0x20]);
    assert_eq!(bytes(CpuKind::W65C02, &["        lda ($1234)"]), vec![0xAD, 0x34, 0x12]);

    let err = assemble_err(CpuKind::M6502, &["        lda ($20)"]);
    assert_eq!(err.error().kind(), AsmErrorKind::ModeNotSupported);
    let err = assemble_err(CpuKind::M6502, &["ptr = $20", "        sta (ptr)"]);
    assert_eq!(err.error().kind(), AsmErrorKind::ModeNotSupported);
}

#[test]
fn overlapping_org_is_an_illegal_write_but_poke_overwrites() {
    let err = assemble_err(
        CpuKind::M6502,
        &[
            "        .org $1000",
            "        .byte 1, 2",
            "        .org $1001",
            "        .byte 3",
        ],
    );
    assert_eq!(err.error().kind(), AsmErrorKind::ProgramOverflow);
    let diag = &err.diagnostics()[0];
    assert_eq!(diag.line(), 4);
    assert_eq!(diag.error().message(), "Illegal write at $1001");

    assert_eq!(
        image(
            CpuKind::M6502,
            &["        .org $1000", "        .byte 1, 2", "        .poke $1001, 3"],
        ),
        (0x1000, vec![1, 3])
    );
}

#[test]
fn z80_index_register_encodings() {
    assert_encodings(
        CpuKind::Z80,
        &[
            ("ld a, (ix+5)", vec![0xDD, 0x7E, 0x05]),
            ("ld (iy-2), $12", vec![0xFD, 0x36, 0xFE, 0x12]),
            ("inc (ix+1)", vec![0xDD, 0x34, 0x01]),
            ("ld ix, $1234", vec![0xDD, 0x21, 0x34, 0x12]),
            ("jp (ix)", vec![0xDD, 0xE9]),
            ("bit 3, (ix+4)", vec![0xDD, 0xCB, 0x04, 0x5E]),
            ("set 7, (iy+0)", vec![0xFD, 0xCB, 0x00, 0xFE]),
            ("res 0, (ix-1)", vec![0xDD, 0xCB, 0xFF, 0x86]),
            ("rlc (ix+2)", vec![0xDD, 0xCB, 0x02, 0x06]),
        ],
    );
    let err = assemble_err(CpuKind::Z80, &["        ld a, (ix+200)"]);
    assert_eq!(err.error().kind(), AsmErrorKind::IllegalQuantity);
}

#[test]
fn m6809_indexed_postbytes() {
    assert_encodings(
        CpuKind::M6809,
        &[
            ("lda ,x", vec![0xA6, 0x84]),
            ("lda 5,x", vec![0xA6, 0x05]),
            ("lda -16,y", vec![0xA6, 0x30]),
            ("lda 100,u", vec![0xA6, 0xC8, 0x64]),
            ("lda $1234,s", vec![0xA6, 0xE9, 0x12, 0x34]),
            ("lda a,x", vec![0xA6, 0x86]),
            ("ldb d,y", vec![0xE6, 0xAB]),
            ("lda ,x+", vec![0xA6, 0x80]),
            ("lda ,x++", vec![0xA6, 0x81]),
            ("lda ,-x", vec![0xA6, 0x82]),
            ("lda ,--x", vec![0xA6, 0x83]),
            ("lda [5,x]", vec![0xA6, 0x98, 0x05]),
            ("lda [$1234]", vec![0xA6, 0x9F, 0x12, 0x34]),
            ("leax 10,x", vec![0x30, 0x0A]),
        ],
    );
    assert_eq!(
        bytes(
            CpuKind::M6809,
            &["        .org $1000", "table   .byte 7", "        lda table,pcr"],
        ),
        vec![0x07, 0xA6, 0x8C, 0xFC]
    );
}

#[test]
fn m6809_long_branches_wrap_around_memory() {
    assert_eq!(
        image(CpuKind::M6809, &["        .org $0010", "        lbra $f000"]),
        (0x0010, vec![0x16, 0xEF, 0xED])
    );
    assert_eq!(
        image(CpuKind::M6809, &["        .org $f000", "        lbsr $0010"]),
        (0xF000, vec![0x17, 0x10, 0x0D])
    );
    assert_eq!(
        bytes(CpuKind::M6809, &["        .org $1000", "here    lbne here"]),
        vec![0x10, 0x26, 0xFF, 0xFC]
    );
}

#[test]
fn m6800_program_assembles() {
    assert_eq!(
        image(
            CpuKind::M6800,
            &[
                "        .org $0100",
                "        ldaa #$12",
                "        ldx #$1234",
                "        staa 5,x",
                "        ldab ,x",
                "        clr $20",
                "        jsr $0200",
                "        psha",
                "        bra done",
                "done    rts",
            ],
        ),
        (
            0x0100,
            vec![
                0x86, 0x12, 0xCE, 0x12, 0x34, 0xA7, 0x05, 0xE6, 0x00, 0x7F, 0x00, 0x20, 0xBD,
                0x02, 0x00, 0x36, 0x20, 0x00, 0x39,
            ]
        )
    );
}

#[test]
fn m6800_rejects_6809_forms() {
    let err = assemble_err(CpuKind::M6800, &["        ldaa [5,x]"]);
    assert_eq!(err.error().kind(), AsmErrorKind::ModeNotSupported);
    let err = assemble_err(CpuKind::M6800, &["        staa #1"]);
    assert_eq!(err.error().kind(), AsmErrorKind::ModeNotSupported);
    let err = assemble_err(CpuKind::M6800, &["        lbra $1000"]);
    assert_eq!(err.error().kind(), AsmErrorKind::Syntax);
    let err = assemble_err(CpuKind::M6800, &["        ldaa 300,x"]);
    assert_eq!(err.error().kind(), AsmErrorKind::IllegalQuantity);
    let err = assemble_err(CpuKind::M6800, &["        lda #1"]);
    assert_eq!(err.error().kind(), AsmErrorKind::Syntax);
}
