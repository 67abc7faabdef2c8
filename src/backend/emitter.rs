//! MIPS assembly emitter
//!
//! A stateful sink that accumulates the output text, switching between the
//! `.data` and `.text` sections implicitly as lines are emitted. It owns
//! the label counter (seeded at 0, so output is deterministic for a given
//! input) and the string-literal interning map.
//!
//! Stack convention: push stores through `0($sp)` then moves the pointer
//! down a word, so `$sp` always names the next free slot; pop reads from
//! `4($sp)` and moves it back up.

use std::collections::HashMap;
use std::fmt::Write;

pub const SP: &str = "$sp";
pub const FP: &str = "$fp";
pub const RA: &str = "$ra";
pub const V0: &str = "$v0";
pub const A0: &str = "$a0";
pub const T0: &str = "$t0";
pub const T1: &str = "$t1";
pub const ZERO: &str = "$zero";

/// Booleans are encoded as integers.
pub const TRUE: &str = "1";
pub const FALSE: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Data,
    Text,
}

/// The assembly emitter
pub struct Emitter {
    buf: String,
    label_counter: usize,
    strings: HashMap<String, String>,
    section: Section,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            label_counter: 0,
            strings: HashMap::new(),
            section: Section::None,
        }
    }

    /// Take the accumulated assembly text.
    pub fn finish(self) -> String {
        self.buf
    }

    /// Produce a fresh label. Shared by jump targets and string literals.
    pub fn next_label(&mut self) -> String {
        let label = format!(".L{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    fn emit(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    fn data(&mut self) {
        if self.section != Section::Data {
            self.emit("\t.data");
            self.section = Section::Data;
        }
    }

    fn text(&mut self) {
        if self.section != Section::Text {
            self.emit("\t.text");
            self.section = Section::Text;
        }
    }

    // ==================== Instruction Forms ====================

    /// Emit a plain instruction: `\top\targ, arg, ...`
    pub fn generate(&mut self, op: &str, args: &[&str]) {
        self.text();
        let line = if args.is_empty() {
            format!("\t{}", op)
        } else {
            format!("\t{}\t{}", op, args.join(", "))
        };
        self.emit(&line);
    }

    pub fn generate_with_comment(&mut self, op: &str, comment: &str, args: &[&str]) {
        self.text();
        let mut line = if args.is_empty() {
            format!("\t{}", op)
        } else {
            format!("\t{}\t{}", op, args.join(", "))
        };
        if !comment.is_empty() {
            let _ = write!(line, "\t\t# {}", comment);
        }
        self.emit(&line);
    }

    /// Emit an indexed-addressing instruction: `\top\treg, offset(base)`
    pub fn generate_indexed(&mut self, op: &str, reg: &str, base: &str, offset: i32) {
        self.generate_indexed_with_comment(op, reg, base, offset, "");
    }

    pub fn generate_indexed_with_comment(
        &mut self,
        op: &str,
        reg: &str,
        base: &str,
        offset: i32,
        comment: &str,
    ) {
        self.text();
        let mut line = format!("\t{}\t{}, {}({})", op, reg, offset, base);
        if !comment.is_empty() {
            let _ = write!(line, "\t\t# {}", comment);
        }
        self.emit(&line);
    }

    pub fn gen_label(&mut self, label: &str) {
        self.text();
        self.emit(&format!("{}:", label));
    }

    // ==================== Stack Helpers ====================

    pub fn gen_push(&mut self, reg: &str) {
        self.generate_indexed("sw", reg, SP, 0);
        self.generate("subu", &[SP, SP, "4"]);
    }

    pub fn gen_pop(&mut self, reg: &str) {
        self.generate_indexed("lw", reg, SP, 4);
        self.generate("addu", &[SP, SP, "4"]);
    }

    pub fn gen_push_lit_int(&mut self, value: i32) {
        self.generate("li", &[T0, &value.to_string()]);
        self.gen_push(T0);
    }

    pub fn gen_push_lit_bool(&mut self, value: bool) {
        self.generate("li", &[T0, if value { TRUE } else { FALSE }]);
        self.gen_push(T0);
    }

    /// Intern a string literal into `.data` and push its address. Identical
    /// literals share one label.
    pub fn gen_push_lit_str(&mut self, value: &str) {
        let label = match self.strings.get(value) {
            Some(label) => label.clone(),
            None => {
                let label = self.next_label();
                self.strings.insert(value.to_string(), label.clone());
                self.data();
                let escaped = escape_asciiz(value);
                let line = format!("{}:\t.asciiz\t\"{}\"", label, escaped);
                self.emit(&line);
                label
            }
        };
        self.generate("la", &[T0, &label]);
        self.gen_push(T0);
    }

    // ==================== Data Section ====================

    /// Reserve one word in `.data` under the global's prefixed label.
    pub fn gen_data_word(&mut self, name: &str) {
        self.data();
        let line = format!("_{}:\t.word\t0", name);
        self.emit(&line);
    }

    // ==================== Function Scaffolding ====================

    /// Function entry labels. `main` is additionally exported unprefixed.
    pub fn gen_func_preamble(&mut self, name: &str) {
        self.text();
        if name == "main" {
            self.emit("\t.globl\tmain");
            self.gen_label("main");
        }
        self.gen_label(&format!("_{}", name));
    }

    pub fn gen_func_prologue(&mut self, param_size: i32, local_size: i32) {
        self.gen_push(RA);
        self.gen_push(FP);
        self.generate_with_comment(
            "addu",
            "set the frame pointer",
            &[FP, SP, &(param_size + 8).to_string()],
        );
        self.generate_with_comment(
            "subu",
            "allocate space for locals",
            &[SP, SP, &local_size.to_string()],
        );
    }

    /// Epilogue: restore RA and the caller's FP, pop the whole frame
    /// including the arguments, and leave. `main` exits by syscall.
    pub fn gen_func_epilogue(&mut self, name: &str, exit_label: &str, param_size: i32) {
        self.gen_label(exit_label);
        self.generate_indexed_with_comment("lw", RA, FP, -param_size, "restore return address");
        self.generate_with_comment("move", "save control link", &[T0, FP]);
        self.generate_indexed_with_comment(
            "lw",
            FP,
            FP,
            -(param_size + 4),
            "restore frame pointer",
        );
        self.generate_with_comment("move", "restore stack pointer", &[SP, T0]);
        if name == "main" {
            self.gen_exit_syscall();
        } else {
            self.generate_with_comment("jr", "return", &[RA]);
        }
    }

    // ==================== Syscalls ====================

    pub fn gen_read_int_syscall(&mut self) {
        self.generate("li", &[V0, "5"]);
        self.generate("syscall", &[]);
    }

    pub fn gen_read_bool_syscall(&mut self) {
        // booleans travel as integers
        self.gen_read_int_syscall();
    }

    pub fn gen_write_int_syscall(&mut self) {
        self.generate("li", &[V0, "1"]);
        self.generate("syscall", &[]);
    }

    pub fn gen_write_bool_syscall(&mut self) {
        self.gen_write_int_syscall();
    }

    pub fn gen_write_string_syscall(&mut self) {
        self.generate("li", &[V0, "4"]);
        self.generate("syscall", &[]);
    }

    pub fn gen_exit_syscall(&mut self) {
        self.generate_with_comment("li", "exit", &[V0, "10"]);
        self.generate("syscall", &[]);
    }

    /// Flip a 0/1 boolean in place.
    pub fn gen_flip_one_bit(&mut self, reg: &str) {
        self.generate("xori", &[reg, reg, "1"]);
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_asciiz(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_shapes() {
        let mut em = Emitter::new();
        em.gen_push(T0);
        em.gen_pop(T1);
        let out = em.finish();
        assert!(out.contains("\tsw\t$t0, 0($sp)"));
        assert!(out.contains("\tsubu\t$sp, $sp, 4"));
        assert!(out.contains("\tlw\t$t1, 4($sp)"));
        assert!(out.contains("\taddu\t$sp, $sp, 4"));
    }

    #[test]
    fn test_label_counter_starts_at_zero() {
        let mut em = Emitter::new();
        assert_eq!(em.next_label(), ".L0");
        assert_eq!(em.next_label(), ".L1");
        assert_eq!(em.next_label(), ".L2");
    }

    #[test]
    fn test_string_interning_is_idempotent() {
        let mut em = Emitter::new();
        em.gen_push_lit_str("hi");
        em.gen_push_lit_str("hi");
        em.gen_push_lit_str("bye");
        let out = em.finish();
        assert_eq!(out.matches(".asciiz").count(), 2);
    }

    #[test]
    fn test_sections_switch_implicitly() {
        let mut em = Emitter::new();
        em.gen_data_word("g");
        em.generate("li", &[T0, "1"]);
        em.gen_data_word("h");
        let out = em.finish();
        assert_eq!(out.matches("\t.data").count(), 2);
        assert_eq!(out.matches("\t.text").count(), 1);
        assert!(out.contains("_g:\t.word\t0"));
        assert!(out.contains("_h:\t.word\t0"));
    }

    #[test]
    fn test_string_escapes_are_reencoded() {
        let mut em = Emitter::new();
        em.gen_push_lit_str("a\nb\"c");
        let out = em.finish();
        assert!(out.contains(".asciiz\t\"a\\nb\\\"c\""));
    }

    #[test]
    fn test_main_preamble_exports_unprefixed_label() {
        let mut em = Emitter::new();
        em.gen_func_preamble("main");
        let out = em.finish();
        assert!(out.contains("\t.globl\tmain"));
        assert!(out.contains("main:"));
        assert!(out.contains("_main:"));
    }
}
