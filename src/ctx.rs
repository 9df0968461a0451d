//! Shared front-end context: identifier interning and the keyword table.
//!
//! Every identifier in a program passes through here once; scanner, parser
//! and evaluator all traffic in the resulting `Symbol` handles, and reserved
//! words are resolved against symbols rather than raw strings.

use std::borrow::Borrow;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::token::Token;

/// Mostly read-only state shared by the whole pipeline and persisting across
/// interpreter sessions, so symbols stay comparable between REPL lines.
///
/// Keyword resolution lives next to the interner because a reserved word is
/// just a symbol the table already knows about.  (A lazy static does not
/// work here because Symbol and so Token is not Sync.)
#[derive(Debug)]
pub struct Context {
    symbols: RefCell<HashSet<Symbol>>,
    keywords: HashMap<Symbol, Token>,
}

impl Context {
    /// Creates a new context with every reserved word pre-interned.
    ///
    /// Returns a Rc because the context is shared between various data
    /// structures.
    pub fn new() -> Rc<Self> {
        let mut ctx = Context {
            symbols: RefCell::new(HashSet::new()),
            keywords: HashMap::new(),
        };
        for (name, token) in KEYWORDS {
            let sym = ctx.symbol(name);
            let prev = ctx.keywords.insert(sym, token);
            debug_assert!(prev.is_none(), "keyword table has a duplicate entry");
        }
        Rc::new(ctx)
    }

    /// Intern `name` if needed and return its symbol.  Interning the same
    /// text twice hands back clones of a single allocation.
    pub fn symbol(&self, name: &str) -> Symbol {
        let mut symbols = self.symbols.borrow_mut();
        if let Some(sym) = symbols.get(name) {
            return sym.clone();
        }
        let sym = Symbol(Rc::from(name));
        symbols.insert(sym.clone());
        sym
    }

    /// Return the token for `id` if it is a reserved word.
    pub fn keyword(&self, id: &Symbol) -> Option<Token> {
        self.keywords.get(id).cloned()
    }
}

const KEYWORDS: [(&str, Token); 17] = [
    ("and", Token::And),
    ("or", Token::Or),
    ("true", Token::True),
    ("false", Token::False),
    ("print", Token::Print),
    ("var", Token::Var),
    ("nil", Token::Nil),
    ("if", Token::If),
    ("else", Token::Else),
    ("while", Token::While),
    ("for", Token::For),
    ("fun", Token::Fun),
    ("return", Token::Return),
    ("break", Token::Break),
    ("class", Token::Class),
    ("this", Token::This),
    ("super", Token::Super),
];

/// An interned, immutable identifier.
///
/// The interner guarantees one allocation per distinct text, so equality is
/// a pointer comparison while hashing goes through the content; the two
/// agree precisely because of that uniqueness, which also keeps the
/// `Borrow<str>` lookups below coherent.
#[derive(Debug, Clone)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
