//! End-to-end tests for the Osprey front end through its public API.
//!
//! Each test feeds a complete program to the parser and asserts either a
//! clean parse or the exact diagnostic, the way the CLI drives it.

use osprey::NullBuilder;
use osprey::SsaModule;
use osprey::diagnostics::{CompileError, ErrorKind, format_error};
use osprey::parser::Parser;
use osprey::types::ValueType;

fn parse(source: &str) -> Result<(), CompileError> {
    let mut builder = NullBuilder::new();
    Parser::new(source, &mut builder).parse()
}

fn parse_err(source: &str) -> CompileError {
    parse(source).expect_err("source must be rejected")
}

// =============================================================================
// Whole-program scenarios
// =============================================================================

#[test]
fn accepts_the_canonical_scenario() {
    let source = "PROGRAM P IS GLOBAL VARIABLE X: INTEGER; BEGIN X := 1 + 2; END PROGRAM .";
    assert!(parse(source).is_ok());
}

#[test]
fn accepts_a_program_with_every_construct() {
    let source = r#"
        PROGRAM DEMO IS

        GLOBAL VARIABLE TOTAL: FLOAT;
        VARIABLE FLAGS: BOOL[8];
        VARIABLE I: INTEGER;

        PROCEDURE SCALE: FLOAT (VARIABLE BASE: FLOAT, VARIABLE FACTOR: INTEGER)
        VARIABLE RESULT: FLOAT;
        BEGIN
            RESULT := BASE * FACTOR;
            RETURN RESULT;
        END PROCEDURE;

        BEGIN
            TOTAL := 0.0;
            FOR (I := 0; I < 8)
                IF (FLAGS[I]) THEN
                    TOTAL := TOTAL + SCALE(1.5, 2);
                ELSE
                    TOTAL := TOTAL - 1;
                END IF;
            END FOR;
        END PROGRAM .
    "#;
    assert!(parse(source).is_ok());
}

#[test]
fn rejects_zero_length_arrays() {
    let err = parse_err("PROGRAM P IS VARIABLE A: INTEGER[0]; BEGIN END PROGRAM .");
    assert_eq!(err.kind, ErrorKind::IllegalArrayLength);
}

#[test]
fn rejects_return_in_program_body() {
    let err = parse_err("PROGRAM P IS BEGIN RETURN 1; END PROGRAM .");
    assert_eq!(err.kind, ErrorKind::ReturnOutsideProcedure);
}

#[test]
fn reports_the_failing_line() {
    let source = "PROGRAM P IS\nVARIABLE X: INTEGER;\nBEGIN\nY := 1;\nEND PROGRAM .";
    let err = parse_err(source);
    assert_eq!(err.kind, ErrorKind::UndeclaredSymbol("Y".to_string()));
    assert_eq!(err.line, 4);
    assert_eq!(format_error("demo.osp", &err), "demo.osp:4: error: undeclared symbol 'Y'");
}

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn relational_binds_tighter_than_additive() {
    // 1 + 2 < 3 groups as 1 + (2 < 3); the BOOL comparison result is not a
    // legal '+' operand, so the expression is rejected there.
    let err = parse_err("PROGRAM P IS VARIABLE X: INTEGER; BEGIN X := 1 + 2 < 3; END PROGRAM .");
    assert_eq!(
        err.kind,
        ErrorKind::InvalidOperandType {
            op: "+".to_string(),
            operand: ValueType::Bool,
        }
    );
}

#[test]
fn relational_result_feeds_boolean_operators() {
    let source = "PROGRAM P IS VARIABLE X: INTEGER; BEGIN X := 1 & 2 < 3; END PROGRAM .";
    assert!(parse(source).is_ok());
}

#[test]
fn relational_chains_evaluate_left_to_right() {
    // (1 < 2) yields BOOL, which is a legal operand for the next comparison.
    let source = "PROGRAM P IS VARIABLE B: BOOL; BEGIN B := 1 < 2 < 3; END PROGRAM .";
    assert!(parse(source).is_ok());
}

// =============================================================================
// Scopes and declarations
// =============================================================================

#[test]
fn duplicate_globals_rejected_across_procedures() {
    let source = "PROGRAM P IS \
                  GLOBAL VARIABLE X: INTEGER; \
                  PROCEDURE Q: INTEGER () \
                  GLOBAL VARIABLE X: FLOAT; \
                  BEGIN RETURN 1; END PROCEDURE; \
                  BEGIN END PROGRAM .";
    assert_eq!(parse_err(source).kind, ErrorKind::DuplicateDeclaration("X".to_string()));
}

#[test]
fn same_name_locals_in_sibling_procedures_are_legal() {
    let source = "PROGRAM P IS \
                  PROCEDURE A: INTEGER () VARIABLE N: INTEGER; \
                  BEGIN N := 1; RETURN N; END PROCEDURE; \
                  PROCEDURE B: INTEGER () VARIABLE N: INTEGER; \
                  BEGIN N := 2; RETURN N; END PROCEDURE; \
                  BEGIN END PROGRAM .";
    assert!(parse(source).is_ok());
}

#[test]
fn local_shadows_global_of_different_type() {
    let source = "PROGRAM P IS \
                  GLOBAL VARIABLE X: INTEGER; \
                  PROCEDURE Q: STRING (VARIABLE X: STRING) \
                  BEGIN RETURN X; END PROCEDURE; \
                  BEGIN X := 1; END PROGRAM .";
    assert!(parse(source).is_ok());
}

#[test]
fn scope_is_popped_even_when_a_body_fails() {
    let source = "PROGRAM P IS \
                  PROCEDURE Q: INTEGER (VARIABLE A: INTEGER) \
                  BEGIN RETURN MISSING; END PROCEDURE; \
                  BEGIN END PROGRAM .";
    let mut builder = NullBuilder::new();
    let mut parser = Parser::new(source, &mut builder);
    assert!(parser.parse().is_err());
    // Only the reserved and global scopes remain active.
    assert_eq!(parser.scopes().depth(), 2);
}

// =============================================================================
// Calls
// =============================================================================

#[test]
fn call_arity_must_match_exactly() {
    let header = "PROGRAM P IS VARIABLE Y: INTEGER; \
                  PROCEDURE Q: INTEGER (VARIABLE A: INTEGER, VARIABLE B: FLOAT) \
                  BEGIN RETURN A; END PROCEDURE; BEGIN ";
    for call in ["Q(1)", "Q(1, 2.5, 3)"] {
        let source = format!("{header}Y := {call}; END PROGRAM .");
        assert_eq!(
            parse_err(&source).kind,
            ErrorKind::WrongArgumentCount {
                name: "Q".to_string(),
                expected: 2,
            },
            "call {call} must be rejected"
        );
    }
    let ok = format!("{header}Y := Q(1, 2.5); END PROGRAM .");
    assert!(parse(&ok).is_ok());
}

#[test]
fn call_argument_types_must_match_positionally() {
    let source = "PROGRAM P IS VARIABLE Y: INTEGER; \
                  PROCEDURE Q: INTEGER (VARIABLE A: INTEGER, VARIABLE B: FLOAT) \
                  BEGIN RETURN A; END PROCEDURE; \
                  BEGIN Y := Q(\"text\", 2.5); END PROGRAM .";
    assert_eq!(
        parse_err(source).kind,
        ErrorKind::InvalidArgumentType {
            name: "Q".to_string(),
            position: 1,
            expected: ValueType::Int,
            found: ValueType::Str,
        }
    );
}

// =============================================================================
// Types
// =============================================================================

#[test]
fn numeric_promotion_in_all_operator_layers() {
    let source = "PROGRAM P IS VARIABLE F: FLOAT; \
                  BEGIN F := 1 + 2.0; F := 2.0 - 1; F := 3 * 0.5; F := 0.5 / 3; END PROGRAM .";
    assert!(parse(source).is_ok());
}

#[test]
fn string_plus_is_rejected() {
    let err = parse_err("PROGRAM P IS VARIABLE S: STRING; BEGIN S := S + S; END PROGRAM .");
    assert_eq!(
        err.kind,
        ErrorKind::InvalidOperandType {
            op: "+".to_string(),
            operand: ValueType::Str,
        }
    );
}

#[test]
fn return_value_uses_directional_convertibility() {
    // INTEGER -> FLOAT is convertible; FLOAT -> INTEGER is not.
    let ok = "PROGRAM P IS PROCEDURE Q: FLOAT () BEGIN RETURN 2; END PROCEDURE; \
              BEGIN END PROGRAM .";
    assert!(parse(ok).is_ok());
    let bad = "PROGRAM P IS PROCEDURE Q: INTEGER () BEGIN RETURN 2.0; END PROCEDURE; \
               BEGIN END PROGRAM .";
    assert_eq!(
        parse_err(bad).kind,
        ErrorKind::IncompatibleReturnType {
            expected: ValueType::Int,
            found: ValueType::Float,
        }
    );
}

#[test]
fn condition_accepts_int_but_not_float() {
    let ok = "PROGRAM P IS VARIABLE X: INTEGER; \
              BEGIN IF (X) THEN X := 1; END IF; END PROGRAM .";
    assert!(parse(ok).is_ok());
    let bad = "PROGRAM P IS VARIABLE X: INTEGER; \
               BEGIN IF (1.5) THEN X := 1; END IF; END PROGRAM .";
    assert_eq!(parse_err(bad).kind, ErrorKind::NonBoolCondition);
}

// =============================================================================
// Lexical failures surface through parse()
// =============================================================================

#[test]
fn unterminated_comment_fails_the_parse() {
    let source = "PROGRAM P IS BEGIN END PROGRAM . /* open";
    assert_eq!(parse_err(source).kind, ErrorKind::UnterminatedComment);
}

#[test]
fn dropped_bare_equal_fails_the_parse() {
    let source = "PROGRAM P IS VARIABLE X: INTEGER; BEGIN X := 1 = 1; END PROGRAM .";
    let err = parse_err(source);
    assert_eq!(err.kind, ErrorKind::UnrecognizedToken("=".to_string()));
}

// =============================================================================
// IR output
// =============================================================================

#[test]
fn ssa_module_contains_program_and_globals() {
    let source = "PROGRAM MAIN IS GLOBAL VARIABLE X: INTEGER; \
                  BEGIN X := 1 + 2; END PROGRAM .";
    let mut module = SsaModule::new();
    assert!(Parser::new(source, &mut module).parse().is_ok());
    let text = module.render();
    assert!(text.contains("global INTEGER @X[1]"), "missing global: {text}");
    assert!(text.contains("define NONE @MAIN()"), "missing program function: {text}");
    assert!(text.contains("add INTEGER"), "missing add: {text}");
    assert!(text.contains("store"), "missing store: {text}");
}

#[test]
fn ssa_module_promotes_mixed_arithmetic_to_float() {
    let source = "PROGRAM MAIN IS GLOBAL VARIABLE F: FLOAT; \
                  BEGIN F := 1 + 2.5; END PROGRAM .";
    let mut module = SsaModule::new();
    assert!(Parser::new(source, &mut module).parse().is_ok());
    let text = module.render();
    assert!(text.contains("sitofp"), "missing int-to-float conversion: {text}");
    assert!(text.contains("add FLOAT"), "missing float add: {text}");
}

#[test]
fn ssa_module_emits_procedures_and_calls() {
    let source = "PROGRAM MAIN IS VARIABLE Y: INTEGER; \
                  PROCEDURE TWICE: INTEGER (VARIABLE N: INTEGER) \
                  BEGIN RETURN N + N; END PROCEDURE; \
                  BEGIN Y := TWICE(21); END PROGRAM .";
    let mut module = SsaModule::new();
    assert!(Parser::new(source, &mut module).parse().is_ok());
    let text = module.render();
    assert!(text.contains("define INTEGER @TWICE(INTEGER)"), "missing procedure: {text}");
    assert!(text.contains("call INTEGER @TWICE"), "missing call: {text}");
}

#[test]
fn ssa_module_branches_on_if() {
    let source = "PROGRAM MAIN IS VARIABLE X: INTEGER; \
                  BEGIN IF (X < 1) THEN X := 1; ELSE X := 2; END IF; END PROGRAM .";
    let mut module = SsaModule::new();
    assert!(Parser::new(source, &mut module).parse().is_ok());
    let text = module.render();
    assert!(text.contains("br %"), "missing conditional branch: {text}");
    assert!(text.contains("then0:"), "missing then block: {text}");
    assert!(text.contains("else0:"), "missing else block: {text}");
    assert!(text.contains("merge0:"), "missing merge block: {text}");
}
