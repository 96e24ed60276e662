//! Native functions installed into the global scope.
//!
//! Each built-in checks the runtime types of its own arguments; arity is
//! checked by the interpreter before the body runs.

use std::{
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::Path,
    process::Command,
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use rand::Rng;
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    callable::Callable, environment::Environment, error::RuntimeError, interpreter::Interpreter,
    token::Token, value::Value,
};

type NativeBody = fn(&mut Interpreter, &[Value], &Token) -> Result<Value, RuntimeError>;

#[derive(Clone)]
pub struct NativeFn {
    name: &'static str,
    arity: usize,
    body: NativeBody,
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("body", &"<function pointer>".to_string())
            .finish()
    }
}

impl fmt::Display for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

impl Callable for NativeFn {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        (self.body)(interpreter, &args, paren)
    }

    fn same_as(&self, other: &dyn Callable) -> bool {
        other.as_user_function().is_none() && other.name() == self.name
    }
}

const BUILTINS: [(&str, usize, NativeBody); 15] = [
    ("clock", 0, clock),
    ("input", 1, input),
    ("substring", 3, substring),
    ("len", 1, len),
    ("floor", 1, floor),
    ("isInt", 1, is_int),
    ("toInt", 1, to_int),
    ("toLower", 1, to_lower),
    ("replace", 3, replace),
    ("wait", 1, wait),
    ("random", 2, random),
    ("readFile", 1, read_file),
    ("writeFile", 3, write_file),
    ("fileExists", 1, file_exists),
    ("executeCommand", 2, execute_command),
];

pub fn install(globals: &mut Environment) {
    for (name, arity, body) in BUILTINS {
        globals.insert(name, Value::Callable(Box::new(NativeFn { name, arity, body })));
    }
}

fn is_integer(number: f64) -> bool {
    number.is_finite() && number.fract() == 0.0
}

fn expect_string<'v>(
    args: &'v [Value],
    idx: usize,
    paren: &Token,
    message: &str,
) -> Result<&'v str, RuntimeError> {
    match args.get(idx) {
        Some(Value::String(string)) => Ok(string),
        _ => Err(RuntimeError::type_error(paren, message)),
    }
}

fn expect_integer(
    args: &[Value],
    idx: usize,
    paren: &Token,
    message: &str,
) -> Result<i64, RuntimeError> {
    match args.get(idx) {
        Some(Value::Number(number)) if is_integer(*number) => Ok(*number as i64),
        _ => Err(RuntimeError::type_error(paren, message)),
    }
}

/// `nil` counts as `false` for optional flags.
fn expect_flag(
    args: &[Value],
    idx: usize,
    paren: &Token,
    message: &str,
) -> Result<bool, RuntimeError> {
    match args.get(idx) {
        Some(Value::Nil) | None => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        _ => Err(RuntimeError::type_error(paren, message)),
    }
}

// clock(): number
fn clock(_: &mut Interpreter, _: &[Value], _: &Token) -> Result<Value, RuntimeError> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default();
    Ok(Value::Number(seconds))
}

// input(prompt: any): string | nil
fn input(interpreter: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let prompt = args.first().map(Value::stringify).unwrap_or_default();
    let output = interpreter.output();
    write!(output, "{}", prompt)
        .and_then(|_| output.flush())
        .map_err(|err| RuntimeError::io_error(paren, format!("Error writing prompt: {}.", err)))?;

    match interpreter.read_line() {
        Ok(Some(line)) => Ok(Value::String(line)),
        Ok(None) => Ok(Value::Nil),
        Err(err) => Err(RuntimeError::io_error(
            paren,
            format!("Error reading input: {}.", err),
        )),
    }
}

// substring(string, start, length): string
fn substring(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let string = expect_string(args, 0, paren, "First argument to substring must be a string.")?;
    let start = expect_integer(
        args,
        1,
        paren,
        "Second argument to substring (start index) must be an integer.",
    )?;
    let length = expect_integer(
        args,
        2,
        paren,
        "Third argument to substring (length) must be an integer.",
    )?;

    let graphemes = string.graphemes(true).collect::<Vec<_>>();
    let count = graphemes.len() as i64;

    if start < 0 || start > count {
        return Err(RuntimeError::range_error(
            paren,
            "Substring start index is out of bounds.",
        ));
    }
    if length < 0 || length > count - start {
        return Err(RuntimeError::range_error(
            paren,
            "Substring length is out of bounds or extends beyond string length.",
        ));
    }

    let start = start as usize;
    Ok(Value::String(
        graphemes[start..start + length as usize].concat(),
    ))
}

// len(string): number
fn len(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    match args.first() {
        Some(Value::String(string)) => Ok(Value::Number(string.graphemes(true).count() as f64)),
        Some(other) => Err(RuntimeError::type_error(
            paren,
            format!("Argument to len must be a string. Got {}.", other.type_name()),
        )),
        None => Err(RuntimeError::type_error(paren, "Cannot get length of nil.")),
    }
}

// floor(number): number
fn floor(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    match args.first() {
        Some(Value::Number(number)) => Ok(Value::Number(number.floor())),
        Some(Value::Nil) | None => Err(RuntimeError::type_error(paren, "Cannot call floor on nil.")),
        Some(other) => Err(RuntimeError::type_error(
            paren,
            format!("Operand for floor must be a number. Got {}.", other.type_name()),
        )),
    }
}

// isInt(any): boolean
fn is_int(_: &mut Interpreter, args: &[Value], _: &Token) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(matches!(
        args.first(),
        Some(Value::Number(number)) if is_integer(*number)
    )))
}

// toInt(string): number
fn to_int(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let string = match args.first() {
        Some(Value::String(string)) => string,
        Some(Value::Nil) | None => {
            return Err(RuntimeError::type_error(paren, "Cannot call toInt on nil."))
        }
        Some(other) => {
            return Err(RuntimeError::type_error(
                paren,
                format!("Argument to toInt must be a string. Got {}.", other.type_name()),
            ))
        }
    };

    match string.trim().parse::<f64>() {
        Ok(number) if is_integer(number) => Ok(Value::Number(number)),
        Ok(_) => Err(RuntimeError::range_error(
            paren,
            format!(
                "String '{}' represents a number with a decimal part, cannot convert to integer.",
                string
            ),
        )),
        Err(_) => Err(RuntimeError::type_error(
            paren,
            format!("String '{}' cannot be converted to a valid number.", string),
        )),
    }
}

// toLower(string): string
fn to_lower(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let string = expect_string(args, 0, paren, "Argument to toLower() must be a string.")?;
    Ok(Value::String(string.to_lowercase()))
}

// replace(input, from, to): string
fn replace(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let input = expect_string(
        args,
        0,
        paren,
        "First argument to replace() (inputString) must be a string.",
    )?;
    let from = expect_string(
        args,
        1,
        paren,
        "Second argument to replace() (stringToReplace) must be a string.",
    )?;
    let to = expect_string(
        args,
        2,
        paren,
        "Third argument to replace() (replacementString) must be a string.",
    )?;

    if from.is_empty() {
        return Ok(Value::String(input.to_string()));
    }
    Ok(Value::String(input.replace(from, to)))
}

// wait(seconds): nil
fn wait(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let seconds = match args.first() {
        Some(Value::Number(seconds)) => *seconds,
        Some(Value::Nil) | None => {
            return Err(RuntimeError::type_error(paren, "Argument to wait() cannot be nil."))
        }
        Some(other) => {
            return Err(RuntimeError::type_error(
                paren,
                format!(
                    "Argument to wait() must be a number (seconds). Got {}.",
                    other.type_name()
                ),
            ))
        }
    };

    if seconds < 0.0 {
        return Err(RuntimeError::range_error(
            paren,
            "Wait duration cannot be negative.",
        ));
    }
    let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
        RuntimeError::range_error(paren, "Wait duration is too large to be represented.")
    })?;

    thread::sleep(duration);
    Ok(Value::Nil)
}

// random(min, max): number in [min, max]
fn random(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let min = expect_integer(
        args,
        0,
        paren,
        "First argument to random() (min) must be an integer.",
    )?;
    let max = expect_integer(
        args,
        1,
        paren,
        "Second argument to random() (max) must be an integer.",
    )?;

    if min > max {
        return Err(RuntimeError::range_error(
            paren,
            "Min argument to random() cannot be greater than max argument.",
        ));
    }

    let mut rng = rand::thread_rng();
    Ok(Value::Number(rng.gen_range(min..=max) as f64))
}

// readFile(path): string
fn read_file(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let path = expect_string(
        args,
        0,
        paren,
        "Argument to readFile must be a string (file path).",
    )?;

    fs::read_to_string(path)
        .map(Value::String)
        .map_err(|err| RuntimeError::io_error(paren, format!("Error reading file '{}': {}.", path, err)))
}

// writeFile(path, content, append): nil
fn write_file(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let path = expect_string(
        args,
        0,
        paren,
        "First argument to writeFile (file path) must be a string and not nil.",
    )?;
    let content = expect_string(
        args,
        1,
        paren,
        "Second argument to writeFile (content) must be a string and not nil.",
    )?;
    let append = expect_flag(
        args,
        2,
        paren,
        "Third argument to writeFile (append) must be a boolean.",
    )?;

    OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .and_then(|mut file| file.write_all(content.as_bytes()))
        .map_err(|err| {
            RuntimeError::io_error(paren, format!("Error writing to file '{}': {}.", path, err))
        })?;

    Ok(Value::Nil)
}

// fileExists(path): boolean
fn file_exists(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let path = expect_string(
        args,
        0,
        paren,
        "Argument to fileExists() must be a string (file path).",
    )?;
    Ok(Value::Bool(Path::new(path).is_file()))
}

// executeCommand(command, printOutput): string | nil
fn execute_command(
    interpreter: &mut Interpreter,
    args: &[Value],
    paren: &Token,
) -> Result<Value, RuntimeError> {
    let command = expect_string(
        args,
        0,
        paren,
        "First argument to executeCommand (command string) must be a string and not nil.",
    )?;
    let print_output = expect_flag(
        args,
        1,
        paren,
        "Second argument to executeCommand (print output) must be a boolean.",
    )?;

    let (shell, flag) = if cfg!(windows) {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    };

    let output = Command::new(shell).args([flag, command]).output().map_err(|err| {
        RuntimeError::io_error(
            paren,
            format!("Error executing command '{}': {}.", command, err),
        )
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);

    if print_output {
        if !stdout.trim().is_empty() {
            writeln!(interpreter.output(), "{}", stdout).map_err(|err| {
                RuntimeError::io_error(paren, format!("Error writing output: {}.", err))
            })?;
        }
        if !stderr.trim().is_empty() {
            eprintln!("{}", stderr);
        }
    }

    if stdout.is_empty() {
        Ok(Value::Nil)
    } else {
        Ok(Value::String(stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;
    use pretty_assertions::assert_eq;

    fn paren() -> Token {
        Token {
            kind: TokenKind::RightParen,
            lexeme: ")".into(),
            literal: None,
            line: 1,
            span: 0..1,
        }
    }

    fn call(body: NativeBody, args: &[Value]) -> Result<Value, RuntimeError> {
        let mut interpreter = Interpreter::with_output(Box::new(std::io::sink()));
        body(&mut interpreter, args, &paren())
    }

    fn string(text: &str) -> Value {
        Value::String(text.into())
    }

    #[test]
    fn substring_validates_types_and_bounds() {
        assert_eq!(
            call(substring, &[string("hello"), Value::Number(1.0), Value::Number(3.0)]),
            Ok(string("ell"))
        );
        assert!(matches!(
            call(substring, &[Value::Number(1.0), Value::Number(0.0), Value::Number(1.0)]),
            Err(RuntimeError::Type { .. })
        ));
        assert!(matches!(
            call(substring, &[string("hello"), Value::Number(0.5), Value::Number(1.0)]),
            Err(RuntimeError::Type { .. })
        ));
        assert!(matches!(
            call(substring, &[string("hello"), Value::Number(6.0), Value::Number(0.0)]),
            Err(RuntimeError::Range { .. })
        ));
        assert!(matches!(
            call(substring, &[string("hello"), Value::Number(2.0), Value::Number(4.0)]),
            Err(RuntimeError::Range { .. })
        ));
    }

    #[test]
    fn substring_rejects_lengths_past_the_integer_range() {
        assert!(matches!(
            call(substring, &[string("abc"), Value::Number(1.0), Value::Number(9.3e18)]),
            Err(RuntimeError::Range { .. })
        ));
    }

    #[test]
    fn len_counts_graphemes() {
        assert_eq!(call(len, &[string("héllo")]), Ok(Value::Number(5.0)));
        assert!(matches!(
            call(len, &[Value::Number(1.0)]),
            Err(RuntimeError::Type { .. })
        ));
    }

    #[test]
    fn number_helpers() {
        assert_eq!(call(floor, &[Value::Number(2.7)]), Ok(Value::Number(2.0)));
        assert!(matches!(call(floor, &[Value::Nil]), Err(RuntimeError::Type { .. })));

        assert_eq!(call(is_int, &[Value::Number(4.0)]), Ok(Value::Bool(true)));
        assert_eq!(call(is_int, &[Value::Number(4.5)]), Ok(Value::Bool(false)));
        assert_eq!(call(is_int, &[string("4")]), Ok(Value::Bool(false)));

        assert_eq!(call(to_int, &[string(" 42 ")]), Ok(Value::Number(42.0)));
        assert!(matches!(call(to_int, &[string("4.5")]), Err(RuntimeError::Range { .. })));
        assert!(matches!(call(to_int, &[string("four")]), Err(RuntimeError::Type { .. })));
    }

    #[test]
    fn string_helpers() {
        assert_eq!(call(to_lower, &[string("HeLLo")]), Ok(string("hello")));
        assert_eq!(
            call(replace, &[string("a-b-c"), string("-"), string("+")]),
            Ok(string("a+b+c"))
        );
        assert_eq!(
            call(replace, &[string("abc"), string(""), string("x")]),
            Ok(string("abc"))
        );
        assert!(matches!(
            call(replace, &[string("abc"), Value::Nil, string("x")]),
            Err(RuntimeError::Type { .. })
        ));
    }

    #[test]
    fn wait_rejects_negative_durations() {
        assert!(matches!(
            call(wait, &[Value::Number(-1.0)]),
            Err(RuntimeError::Range { .. })
        ));
        assert!(matches!(call(wait, &[string("1")]), Err(RuntimeError::Type { .. })));
        assert_eq!(call(wait, &[Value::Number(0.0)]), Ok(Value::Nil));
    }

    #[test]
    fn random_stays_in_inclusive_range() {
        for _ in 0..50 {
            let value = call(random, &[Value::Number(1.0), Value::Number(3.0)]);
            assert!(matches!(value, Ok(Value::Number(n)) if (1.0..=3.0).contains(&n) && n.fract() == 0.0));
        }
        assert_eq!(
            call(random, &[Value::Number(5.0), Value::Number(5.0)]),
            Ok(Value::Number(5.0))
        );
        assert!(matches!(
            call(random, &[Value::Number(3.0), Value::Number(1.0)]),
            Err(RuntimeError::Range { .. })
        ));
    }

    #[test]
    fn files_round_trip_through_builtins() {
        let path = std::env::temp_dir().join(format!("suiron-builtins-{}.txt", std::process::id()));
        let path_value = string(&path.to_string_lossy());

        assert_eq!(call(file_exists, &[path_value.clone()]), Ok(Value::Bool(false)));
        assert_eq!(
            call(write_file, &[path_value.clone(), string("one"), Value::Nil]),
            Ok(Value::Nil)
        );
        assert_eq!(
            call(write_file, &[path_value.clone(), string("two"), Value::Bool(true)]),
            Ok(Value::Nil)
        );
        assert_eq!(call(read_file, &[path_value.clone()]), Ok(string("onetwo")));
        assert_eq!(call(file_exists, &[path_value.clone()]), Ok(Value::Bool(true)));

        let _ = fs::remove_file(&path);
        assert!(matches!(call(read_file, &[path_value]), Err(RuntimeError::Io { .. })));
    }

    #[test]
    fn builtins_are_installed_with_their_arities() {
        let mut globals = Environment::new();
        install(&mut globals);
        for (name, arity, _) in BUILTINS {
            let ident = Token {
                kind: TokenKind::Ident,
                lexeme: name.into(),
                literal: None,
                line: 1,
                span: 0..name.len(),
            };
            match globals.get(&ident) {
                Ok(Value::Callable(callable)) => {
                    assert_eq!(callable.arity(), arity, "arity of {}", name)
                }
                other => panic!("{} is not installed as a callable: {:?}", name, other),
            }
        }
    }
}
