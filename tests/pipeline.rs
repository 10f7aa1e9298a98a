use std::fs;

use moonvm_rust::config::Config;
use moonvm_rust::error::Error;
use moonvm_rust::grammar::Tables;
use moonvm_rust::machine::{BufferHost, Halt, Mutation, Resume, Vm};
use moonvm_rust::processor::Assembler;
use moonvm_rust::processor::lexer::Lexer;
use moonvm_rust::writer::json;

fn fixture() -> String {
    fs::read_to_string("tests/fixtures/countdown.m").unwrap()
}

#[test]
fn countdown_prints_digits() {
    let tables = Tables::moon().unwrap();
    let config = Config::default();
    let image = Assembler::new(&tables, &config).unwrap().assemble(&fixture()).unwrap();

    let mut vm = Vm::new(&image, &config).unwrap();
    let mut host = BufferHost::default();
    assert_eq!(vm.run(&mut host), Halt::Complete);
    assert_eq!(host.output, b"321\n");

    let printed: String = vm
        .history()
        .iter()
        .filter_map(|m| match m {
            Mutation::Output { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(printed, "321\n");
}

#[test]
fn every_byte_of_the_fixture_is_tokenized() {
    let tables = Tables::moon().unwrap();
    let source = fixture();
    let joined: String = Lexer::new(&source, &tables.automaton)
        .map(|lexeme| lexeme.unwrap().token.lexeme)
        .collect();
    assert_eq!(joined, source);
}

#[test]
fn artifact_tables_assemble_identically() {
    let builtin = Tables::moon().unwrap();
    let decoded = Tables::decode(&builtin.encode().unwrap()).unwrap();
    let config = Config::default();

    let a = Assembler::new(&builtin, &config).unwrap().assemble(&fixture()).unwrap();
    let b = Assembler::new(&decoded, &config).unwrap().assemble(&fixture()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn image_survives_json() {
    let tables = Tables::moon().unwrap();
    let config = Config::default();
    let image = Assembler::new(&tables, &config).unwrap().assemble(&fixture()).unwrap();

    let path = std::env::temp_dir().join(format!("moonvm-image-{}.json", std::process::id()));
    json::emit_image(&image, &path).unwrap();
    let back = json::load_image(&fs::read_to_string(&path).unwrap()).unwrap();
    let _ = fs::remove_file(&path);
    assert_eq!(back, image);
}

#[test]
fn debug_symbols_become_breakpoints() {
    let tables = Tables::moon().unwrap();
    let config = Config {
        debug: true,
        ..Config::default()
    };
    let source = "main addi r1, r0, 1\nDebugHere addi r1, r1, 1\nhlt\n";
    let image = Assembler::new(&tables, &config).unwrap().assemble(source).unwrap();

    let mut vm = Vm::new(&image, &config).unwrap();
    assert!(vm.step_mode());
    assert!(vm.breakpoints().contains(&4));

    let mut host = BufferHost::default().with_script(&[Resume::Continue, Resume::Continue]);
    assert_eq!(vm.run(&mut host), Halt::Complete);
    assert_eq!(host.stops, vec![0, 4]);
    assert!(vm.history().contains(&Mutation::info("Hit breakpoint")));
}

#[test]
fn duplicate_symbols_are_rejected_anywhere() {
    let tables = Tables::moon().unwrap();
    let config = Config::default();
    let assembler = Assembler::new(&tables, &config).unwrap();
    let test_cases = vec![
        "x nop\nx nop\n",
        "x nop\nnop\nnop\nnop\nnop\nnop\nnop\nnop\nnop\nnop\nnop\nx hlt\n",
        "x db 1\nalign\nx dw 2\n",
    ];
    for source in test_cases {
        assert_eq!(
            assembler.assemble(source).unwrap_err(),
            Error::DuplicateSymbol("x".into()),
            "{source:?}"
        );
    }
}

#[test]
fn front_end_errors() {
    let tables = Tables::moon().unwrap();
    let config = Config::default();
    let assembler = Assembler::new(&tables, &config).unwrap();

    assert!(matches!(assembler.assemble("hlt $\n"), Err(Error::Lexical { offset: 4, .. })));
    assert!(matches!(assembler.assemble("add r1, r2\n"), Err(Error::Syntax { .. })));
    assert!(matches!(assembler.assemble("r1 hlt\n"), Err(Error::Syntax { offset: 0, .. })));
}
