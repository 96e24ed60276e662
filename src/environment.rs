use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{error::RuntimeError, token::Token, value::Value};

/// One lexical scope frame, linked to the frame that encloses it.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Binds a new name in this frame. Shadowing an outer frame is fine,
    /// defining the same name twice in one frame is not.
    pub fn define(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if self.values.contains_key(&name.lexeme) {
            return Err(RuntimeError::Redefinition {
                token: name.clone(),
            });
        }

        self.values.insert(name.lexeme.clone(), value);
        Ok(())
    }

    /// Binds a host-provided value, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            return Ok(value.clone());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get(name),
            None => Err(RuntimeError::UndefinedVariable {
                token: name.clone(),
            }),
        }
    }

    /// Updates the nearest frame that already binds `name`. Never creates a
    /// binding.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(RuntimeError::UndefinedVariable {
                token: name.clone(),
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Token {
        Token {
            kind: TokenKind::Ident,
            lexeme: name.into(),
            literal: None,
            line: 1,
            span: 0..name.len(),
        }
    }

    #[test]
    fn define_then_get() {
        let mut env = Environment::new();
        env.define(&ident("x"), Value::Number(1.0)).unwrap();
        assert_eq!(env.get(&ident("x")), Ok(Value::Number(1.0)));
    }

    #[test]
    fn redefinition_in_same_frame_fails() {
        let mut env = Environment::new();
        env.define(&ident("x"), Value::Nil).unwrap();
        let err = env.define(&ident("x"), Value::Nil).unwrap_err();
        assert!(matches!(err, RuntimeError::Redefinition { .. }));
    }

    #[test]
    fn lookup_walks_the_chain_and_shadowing_is_local() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals
            .borrow_mut()
            .define(&ident("x"), Value::Number(1.0))
            .unwrap();

        let mut inner = Environment::with_enclosing(globals.clone());
        assert_eq!(inner.get(&ident("x")), Ok(Value::Number(1.0)));

        inner.define(&ident("x"), Value::Number(2.0)).unwrap();
        assert_eq!(inner.get(&ident("x")), Ok(Value::Number(2.0)));
        assert_eq!(globals.borrow().get(&ident("x")), Ok(Value::Number(1.0)));
    }

    #[test]
    fn assign_updates_the_defining_frame() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals
            .borrow_mut()
            .define(&ident("x"), Value::Number(1.0))
            .unwrap();

        let mut inner = Environment::with_enclosing(globals.clone());
        inner.assign(&ident("x"), Value::Number(5.0)).unwrap();

        assert!(!inner.contains("x"));
        assert_eq!(globals.borrow().get(&ident("x")), Ok(Value::Number(5.0)));
    }

    #[test]
    fn unknown_names_are_errors() {
        let mut env = Environment::with_enclosing(Rc::new(RefCell::new(Environment::new())));
        assert!(matches!(
            env.get(&ident("nope")),
            Err(RuntimeError::UndefinedVariable { .. })
        ));
        assert!(matches!(
            env.assign(&ident("nope"), Value::Nil),
            Err(RuntimeError::UndefinedVariable { .. })
        ));
        assert!(!env.contains("nope"));
    }
}
