use indoc::indoc;
use pretty_assertions::assert_eq;

use super::{CodeGenerator, Error};
use crate::parser::test_utils::parse_ok;

const PROLOGUE: &str = indoc! {"
    # pug compiler generated assembly
    .section __DATA,__data

    .section __TEXT,__text,regular,pure_instructions
    .globl _main

    _main:
        pushq %rbp
        movq %rsp, %rbp
        subq $256, %rsp
"};

const EPILOGUE: &str = concat!(
    "    movq $0, %rax\n",
    "    movq %rbp, %rsp\n",
    "    popq %rbp\n",
    "    ret\n",
);

fn generate(src: &str) -> Result<String, Error> {
    CodeGenerator::new().generate(&parse_ok(src))
}

/// The generated code between the fixed prologue and epilogue.
#[track_caller]
fn body(src: &str) -> String {
    let asm = generate(src).expect("generation should succeed");
    let rest = asm
        .strip_prefix(PROLOGUE)
        .expect("output should start with the prologue");
    rest.strip_suffix(EPILOGUE)
        .expect("output should end with the epilogue")
        .to_owned()
}

#[test]
fn whole_program() {
    let expected = indoc! {"
        # pug compiler generated assembly
        .section __DATA,__data

        .section __TEXT,__text,regular,pure_instructions
        .globl _main

        _main:
            pushq %rbp
            movq %rsp, %rbp
            subq $256, %rsp
            movq $5, %rax
            movq %rax, -8(%rbp)
            # let x = ...
            movq -8(%rbp), %rax
            # load variable x
            pushq %rax
            movq $1, %rax
            movq %rax, %rbx
            popq %rax
            addq %rbx, %rax
            movq $0, %rax
            movq %rbp, %rsp
            popq %rbp
            ret
    "};
    assert_eq!(generate("let x = 5; x + 1;").unwrap(), expected);
}

#[test]
fn empty_program() {
    assert_eq!(body(""), "");
}

#[test]
fn arithmetic() {
    let operands = concat!(
        "    pushq %rax\n",
        "    movq $2, %rax\n",
        "    movq %rax, %rbx\n",
        "    popq %rax\n",
    );
    let expected = format!("    movq $7, %rax\n{operands}    cqto\n    idivq %rbx\n    movq %rdx, %rax\n");
    assert_eq!(body("7 % 2"), expected);

    let expected = format!("    movq $6, %rax\n{operands}    cqto\n    idivq %rbx\n");
    assert_eq!(body("6 / 2"), expected);

    assert!(body("2 * 3").contains("    imulq %rbx, %rax\n"));
    assert!(body("2 - 3").contains("    subq %rbx, %rax\n"));
}

#[test]
fn prefix_operators() {
    assert_eq!(body("-5"), "    movq $5, %rax\n    negq %rax\n");
    assert_eq!(body("+5"), "    movq $5, %rax\n");

    let expected = indoc! {"
            movq $1, %rax
            testq %rax, %rax
            jz .Ltrue0
            movq $0, %rax
            jmp .Lend1
        .Ltrue0:
            movq $1, %rax
        .Lend1:
    "};
    assert_eq!(body("!true"), expected);
}

#[test]
fn comparison() {
    let expected = indoc! {"
            movq $1, %rax
            pushq %rax
            movq $2, %rax
            movq %rax, %rbx
            popq %rax
            cmpq %rbx, %rax
            jl .Ltrue0
            movq $0, %rax
            jmp .Lend1
        .Ltrue0:
            movq $1, %rax
        .Lend1:
    "};
    assert_eq!(body("1 < 2"), expected);
}

#[test]
fn comparison_mnemonics() {
    let cases = [
        ("1 == 2", "je"),
        ("1 != 2", "jne"),
        ("1 < 2", "jl"),
        ("1 > 2", "jg"),
        ("1 <= 2", "jle"),
        ("1 >= 2", "jge"),
    ];
    for (src, jump) in cases {
        let asm = body(src);
        assert!(asm.contains(&format!("    {jump} .Ltrue0\n")), "{src}:\n{asm}");
    }
}

#[test]
fn short_circuit() {
    let expected = indoc! {"
            movq $1, %rax
            testq %rax, %rax
            jz .Land_false0
            movq $0, %rax
            testq %rax, %rax
            jz .Land_false0
            movq $1, %rax
            jmp .Land_end1
        .Land_false0:
            movq $0, %rax
        .Land_end1:
    "};
    assert_eq!(body("true && false"), expected);

    let expected = indoc! {"
            movq $0, %rax
            testq %rax, %rax
            jnz .Lor_true0
            movq $1, %rax
            testq %rax, %rax
            jnz .Lor_true0
            movq $0, %rax
            jmp .Lor_end1
        .Lor_true0:
            movq $1, %rax
        .Lor_end1:
    "};
    assert_eq!(body("false || true"), expected);
}

#[test]
fn if_else() {
    let expected = indoc! {"
            movq $1, %rax
            testq %rax, %rax
            jz .Lif_else0
            movq $2, %rax
            jmp .Lif_end1
        .Lif_else0:
            movq $3, %rax
        .Lif_end1:
    "};
    assert_eq!(body("if (1) { 2 } else { 3 }"), expected);
}

#[test]
fn while_with_break() {
    let expected = indoc! {"
        .Lwhile_start0:
            movq $1, %rax
            testq %rax, %rax
            jz .Lwhile_end1
            jmp .Lwhile_end1
            jmp .Lwhile_start0
        .Lwhile_end1:
    "};
    assert_eq!(body("while (true) { break; }"), expected);
}

#[test]
fn for_with_continue() {
    let expected = indoc! {"
            movq $0, %rax
            movq %rax, -8(%rbp)
            # let i = ...
        .Lfor_start0:
            movq -8(%rbp), %rax
            # load variable i
            pushq %rax
            movq $3, %rax
            movq %rax, %rbx
            popq %rax
            cmpq %rbx, %rax
            jl .Ltrue3
            movq $0, %rax
            jmp .Lend4
        .Ltrue3:
            movq $1, %rax
        .Lend4:
            testq %rax, %rax
            jz .Lfor_end2
            jmp .Lfor_continue1
        .Lfor_continue1:
            movq -8(%rbp), %rax
            # load variable i
            pushq %rax
            movq $1, %rax
            movq %rax, %rbx
            popq %rax
            addq %rbx, %rax
            jmp .Lfor_start0
        .Lfor_end2:
    "};
    assert_eq!(body("for (let i = 0; i < 3; i + 1) { continue; }"), expected);
}

#[test]
fn jumps_target_the_innermost_loop() {
    let asm = body("while (true) { while (false) { continue; } break; }");
    let expected_jumps = ["    jmp .Lwhile_start2\n", "    jmp .Lwhile_end1\n"];
    for jump in expected_jumps {
        assert!(asm.contains(jump), "missing {jump:?} in:\n{asm}");
    }
}

#[test]
fn bare_for_loop() {
    let expected = indoc! {"
        .Lfor_start0:
            jmp .Lfor_end2
        .Lfor_continue1:
            jmp .Lfor_start0
        .Lfor_end2:
    "};
    assert_eq!(body("for (;;) { break; }"), expected);
}

#[test]
fn return_tears_down_the_frame() {
    let expected = format!("    movq $5, %rax\n{}", &EPILOGUE[EPILOGUE.find("    movq %rbp").unwrap()..]);
    assert_eq!(body("return 5;"), expected);
}

#[test]
fn redefinition_takes_a_new_slot() {
    let asm = body("let x = 1; let x = 2; x");
    assert!(asm.contains("    movq %rax, -16(%rbp)\n"));
    assert!(asm.contains("    movq -16(%rbp), %rax\n"));
    assert!(!asm.contains("    movq -8(%rbp), %rax\n"));
}

#[test]
fn local_area_grows_past_its_default() {
    let src: String = (0..33).map(|i| format!("let v{i} = {i};")).collect();
    let asm = generate(&src).unwrap();
    assert!(asm.contains("    subq $272, %rsp\n"));
    assert!(asm.contains("    movq %rax, -264(%rbp)\n"));
}

#[test]
fn generation_is_deterministic() {
    let src = "let n = 0; while (n < 10) { if (n == 5) { break; } else { continue; } }";
    let program = parse_ok(src);
    let first = CodeGenerator::new().generate(&program).unwrap();
    let second = CodeGenerator::new().generate(&program).unwrap();
    assert_eq!(first, second);
}

#[test]
fn labels_are_unique_and_numbered_in_order() {
    let src = "
        let a = 1;
        for (let i = 0; i < 10; i + 1) {
            while (a > 2 && !false) { break; }
            if (a <= i || a >= 3) { continue; }
        }
    ";
    let asm = generate(src).unwrap();
    let mut numbers: Vec<usize> = asm
        .lines()
        .filter_map(|line| line.strip_prefix(".L")?.strip_suffix(':'))
        .map(|label| {
            let digits = label.trim_start_matches(|c: char| !c.is_ascii_digit());
            digits.parse().unwrap()
        })
        .collect();
    numbers.sort_unstable();
    let expected: Vec<usize> = (0..numbers.len()).collect();
    assert_eq!(numbers, expected);
}

#[test]
fn failures() {
    let cases = [
        ("break;", Error::BreakOutsideLoop),
        ("continue;", Error::ContinueOutsideLoop),
        ("x + 1", Error::UndefinedVariable("x".into())),
        ("1.5", Error::UnsupportedExpression("FloatLiteral")),
        ("\"s\"", Error::UnsupportedExpression("StringLiteral")),
        ("let f = fn() { 1 };", Error::UnsupportedExpression("FunctionLiteral")),
        ("f(1)", Error::UnsupportedExpression("CallExpression")),
        ("[1]", Error::UnsupportedExpression("ArrayLiteral")),
    ];
    for (src, expected) in cases {
        assert_eq!(generate(src), Err(expected), "{src}");
    }
}

#[test]
fn error_messages() {
    assert_eq!(
        Error::BreakOutsideLoop.to_string(),
        "break statement outside of loop"
    );
    assert_eq!(
        Error::ContinueOutsideLoop.to_string(),
        "continue statement outside of loop"
    );
    assert_eq!(
        Error::UndefinedVariable("y".into()).to_string(),
        "undefined variable: y"
    );
    assert_eq!(
        Error::UnsupportedExpression("HashLiteral").to_string(),
        "unsupported expression type: HashLiteral"
    );
}
