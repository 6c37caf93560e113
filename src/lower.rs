//! Lowering: surface formulas to checked relational AST
//!
//! Names are resolved against the bound relations and the enclosing
//! quantifier bindings, arities are checked, predicate calls are inlined,
//! and the surface-only quantifiers `no`, `one`, and `lone` are rewritten
//! in terms of `all` and `some`.

use rustc_hash::FxHashMap;

use crate::ast::{Decl, Decls, Expression, Formula, Relation, Variable};
use crate::error::{Result, SigrunError};
use crate::model::{
    Model, RunDecl, SurfaceBinaryOp, SurfaceConnective, SurfaceExpr, SurfaceFormula, SurfaceQuant,
    SurfaceUnaryOp,
};

/// Lowers surface formulas against a fixed set of named relations
pub struct Lowerer<'a> {
    model: &'a Model,
    relations: &'a FxHashMap<String, Relation>,
}

/// Innermost-first name bindings introduced by quantifiers and pred calls
type Env = Vec<(String, Expression)>;

impl<'a> Lowerer<'a> {
    /// Creates a lowerer over the model's predicates and the given relations
    pub fn new(model: &'a Model, relations: &'a FxHashMap<String, Relation>) -> Self {
        Self { model, relations }
    }

    /// Lowers the whole problem of a run command: every fact conjoined with
    /// the run's predicate
    ///
    /// A predicate with parameters is run existentially: some binding of
    /// each parameter within its signature must satisfy the body.
    pub fn lower_run(&self, run: &RunDecl) -> Result<Formula> {
        let mut conjuncts = Vec::new();

        for fact in &self.model.facts {
            for formula in &fact.body {
                conjuncts.push(self.formula(formula, &mut Vec::new(), &mut Vec::new())?);
            }
        }

        let pred = self.model.pred(&run.pred).ok_or_else(|| {
            SigrunError::Translation(format!("run names unknown predicate {}", run.pred))
        })?;

        let mut env = Env::new();
        let mut decls: Option<Decls> = None;
        for (param, sig) in &pred.params {
            let domain = self.sig_expression(sig, &pred.name)?;
            let var = Variable::unary(param.clone());
            env.push((param.clone(), Expression::from(&var)));
            let decl = Decl::new(var, domain);
            decls = Some(match decls {
                Some(d) => d.and(decl),
                None => Decls::from(decl),
            });
        }

        let mut body = Vec::new();
        let mut stack = vec![pred.name.clone()];
        for formula in &pred.body {
            body.push(self.formula(formula, &mut env, &mut stack)?);
        }
        let body = Formula::and_all(body);

        conjuncts.push(match decls {
            Some(decls) => Formula::exists(decls, body),
            None => body,
        });

        Ok(Formula::and_all(conjuncts))
    }

    fn sig_expression(&self, sig: &str, pred: &str) -> Result<Expression> {
        let relation = self.relations.get(sig).ok_or_else(|| {
            SigrunError::Translation(format!(
                "parameter of predicate {} has unknown signature {}",
                pred, sig
            ))
        })?;
        if relation.arity() != 1 {
            return Err(SigrunError::Translation(format!(
                "parameter of predicate {} is typed by non-signature {}",
                pred, sig
            )));
        }
        Ok(Expression::from(relation))
    }

    fn formula(
        &self,
        formula: &SurfaceFormula,
        env: &mut Env,
        stack: &mut Vec<String>,
    ) -> Result<Formula> {
        match formula {
            SurfaceFormula::Compare {
                left,
                subset,
                right,
            } => {
                let l = self.expression(left, env)?;
                let r = self.expression(right, env)?;
                if l.arity() != r.arity() {
                    return Err(SigrunError::Translation(format!(
                        "cannot compare expressions of arity {} and {}",
                        l.arity(),
                        r.arity()
                    )));
                }
                Ok(if *subset { l.in_set(r) } else { l.equals(r) })
            }

            SurfaceFormula::Mult { mult, expr } => {
                let e = self.expression(expr, env)?;
                Ok(match mult {
                    SurfaceQuant::Some => e.some(),
                    SurfaceQuant::No => e.no(),
                    SurfaceQuant::One => e.one(),
                    SurfaceQuant::Lone => e.lone(),
                    SurfaceQuant::All => {
                        return Err(SigrunError::Translation(
                            "all is not a multiplicity".to_string(),
                        ))
                    }
                })
            }

            SurfaceFormula::Not(inner) => Ok(self.formula(inner, env, stack)?.not()),

            SurfaceFormula::Connective { op, left, right } => {
                let l = self.formula(left, env, stack)?;
                let r = self.formula(right, env, stack)?;
                Ok(match op {
                    SurfaceConnective::And => l.and(r),
                    SurfaceConnective::Or => l.or(r),
                    SurfaceConnective::Implies => l.implies(r),
                    SurfaceConnective::Iff => l.iff(r),
                })
            }

            SurfaceFormula::Quantified {
                quant,
                vars,
                domain,
                body,
            } => self.quantified(*quant, vars, domain, body, env, stack),

            SurfaceFormula::PredCall { name, args } => self.pred_call(name, args, env, stack),
        }
    }

    /// Lowers a quantified formula
    ///
    /// `no` becomes a negated-body `all`. `lone` says two satisfying
    /// bindings coincide, and `one` is `lone` plus `some`; both re-lower
    /// the body under fresh variables.
    fn quantified(
        &self,
        quant: SurfaceQuant,
        vars: &[String],
        domain: &SurfaceExpr,
        body: &SurfaceFormula,
        env: &mut Env,
        stack: &mut Vec<String>,
    ) -> Result<Formula> {
        if vars.is_empty() {
            return Err(SigrunError::Translation(
                "quantifier binds no variables".to_string(),
            ));
        }
        let domain_expr = self.expression(domain, env)?;
        if domain_expr.arity() != 1 {
            return Err(SigrunError::Translation(format!(
                "quantifier domain must be unary, got arity {}",
                domain_expr.arity()
            )));
        }

        match quant {
            SurfaceQuant::All | SurfaceQuant::Some => {
                let (decls, count) = self.bind(vars, &domain_expr, env);
                let lowered = self.formula(body, env, stack);
                env.truncate(env.len() - count);
                let lowered = lowered?;
                Ok(match quant {
                    SurfaceQuant::All => Formula::forall(decls, lowered),
                    _ => Formula::exists(decls, lowered),
                })
            }

            SurfaceQuant::No => {
                let (decls, count) = self.bind(vars, &domain_expr, env);
                let lowered = self.formula(body, env, stack);
                env.truncate(env.len() - count);
                Ok(Formula::forall(decls, lowered?.not()))
            }

            SurfaceQuant::Lone => self.lone(vars, &domain_expr, body, env, stack),

            SurfaceQuant::One => {
                let at_most = self.lone(vars, &domain_expr, body, env, stack)?;
                let (decls, count) = self.bind(vars, &domain_expr, env);
                let lowered = self.formula(body, env, stack);
                env.truncate(env.len() - count);
                let at_least = Formula::exists(decls, lowered?);
                Ok(at_most.and(at_least))
            }
        }
    }

    /// `lone xs: D | f` as `all xs, xs': D | f(xs) and f(xs') implies
    /// xs = xs'`
    fn lone(
        &self,
        vars: &[String],
        domain: &Expression,
        body: &SurfaceFormula,
        env: &mut Env,
        stack: &mut Vec<String>,
    ) -> Result<Formula> {
        let firsts: Vec<Variable> = vars.iter().map(Variable::unary).collect();
        let seconds: Vec<Variable> = vars
            .iter()
            .map(|v| Variable::unary(format!("{}'", v)))
            .collect();

        let mut decls: Option<Decls> = None;
        for var in firsts.iter().chain(seconds.iter()) {
            let decl = Decl::new(var.clone(), domain.clone());
            decls = Some(match decls {
                Some(d) => d.and(decl),
                None => Decls::from(decl),
            });
        }
        let decls = decls.unwrap_or_default();

        let body_first = self.under(vars, &firsts, env, |lowerer, env| {
            lowerer.formula(body, env, stack)
        })?;
        let body_second = self.under(vars, &seconds, env, |lowerer, env| {
            lowerer.formula(body, env, stack)
        })?;

        let mut agree = Vec::new();
        for (a, b) in firsts.iter().zip(seconds.iter()) {
            agree.push(Expression::from(a).equals(Expression::from(b)));
        }
        let agree = Formula::and_all(agree);

        Ok(Formula::forall(
            decls,
            body_first.and(body_second).implies(agree),
        ))
    }

    fn bind(&self, vars: &[String], domain: &Expression, env: &mut Env) -> (Decls, usize) {
        let mut decls: Option<Decls> = None;
        for name in vars {
            let var = Variable::unary(name.clone());
            env.push((name.clone(), Expression::from(&var)));
            let decl = Decl::new(var, domain.clone());
            decls = Some(match decls {
                Some(d) => d.and(decl),
                None => Decls::from(decl),
            });
        }
        (decls.unwrap_or_default(), vars.len())
    }

    fn under<T>(
        &self,
        names: &[String],
        vars: &[Variable],
        env: &mut Env,
        f: impl FnOnce(&Self, &mut Env) -> Result<T>,
    ) -> Result<T> {
        for (name, var) in names.iter().zip(vars.iter()) {
            env.push((name.clone(), Expression::from(var)));
        }
        let result = f(self, env);
        env.truncate(env.len() - names.len());
        result
    }

    /// Inlines a predicate call by binding parameters to argument
    /// expressions
    fn pred_call(
        &self,
        name: &str,
        args: &[SurfaceExpr],
        env: &mut Env,
        stack: &mut Vec<String>,
    ) -> Result<Formula> {
        if stack.iter().any(|p| p == name) {
            return Err(SigrunError::Translation(format!(
                "predicate {} calls itself",
                name
            )));
        }
        let pred = self.model.pred(name).ok_or_else(|| {
            SigrunError::Translation(format!("call to unknown predicate {}", name))
        })?;
        if args.len() != pred.params.len() {
            return Err(SigrunError::Translation(format!(
                "predicate {} takes {} arguments, got {}",
                name,
                pred.params.len(),
                args.len()
            )));
        }

        // arguments are lowered in the caller's environment
        let mut bindings = Vec::with_capacity(args.len());
        for ((param, sig), arg) in pred.params.iter().zip(args.iter()) {
            let arg_expr = self.expression(arg, env)?;
            if arg_expr.arity() != 1 {
                return Err(SigrunError::Translation(format!(
                    "argument for {} of predicate {} must be unary",
                    param, name
                )));
            }
            self.sig_expression(sig, name)?;
            bindings.push((param.clone(), arg_expr));
        }

        let added = bindings.len();
        env.extend(bindings);
        stack.push(name.to_string());
        let mut body = Vec::with_capacity(pred.body.len());
        let mut lowered = Ok(());
        for formula in &pred.body {
            match self.formula(formula, env, stack) {
                Ok(f) => body.push(f),
                Err(e) => {
                    lowered = Err(e);
                    break;
                }
            }
        }
        stack.pop();
        env.truncate(env.len() - added);
        lowered?;

        Ok(Formula::and_all(body))
    }

    fn expression(&self, expr: &SurfaceExpr, env: &Env) -> Result<Expression> {
        match expr {
            SurfaceExpr::Name(name) => {
                if let Some((_, bound)) = env.iter().rev().find(|(n, _)| n == name) {
                    return Ok(bound.clone());
                }
                let relation = self.relations.get(name).ok_or_else(|| {
                    SigrunError::Translation(format!("unknown name {}", name))
                })?;
                Ok(Expression::from(relation))
            }
            SurfaceExpr::Univ => Ok(Expression::UNIV),
            SurfaceExpr::Iden => Ok(Expression::IDEN),
            SurfaceExpr::None => Ok(Expression::NONE),

            SurfaceExpr::Unary { op, expr } => {
                let e = self.expression(expr, env)?;
                if e.arity() != 2 {
                    return Err(SigrunError::Translation(format!(
                        "{} requires a binary operand, got arity {}",
                        match op {
                            SurfaceUnaryOp::Transpose => "~",
                            SurfaceUnaryOp::Closure => "^",
                            SurfaceUnaryOp::ReflexiveClosure => "*",
                        },
                        e.arity()
                    )));
                }
                Ok(match op {
                    SurfaceUnaryOp::Transpose => e.transpose(),
                    SurfaceUnaryOp::Closure => e.closure(),
                    SurfaceUnaryOp::ReflexiveClosure => e.reflexive_closure(),
                })
            }

            SurfaceExpr::Binary { op, left, right } => {
                let l = self.expression(left, env)?;
                let r = self.expression(right, env)?;
                match op {
                    SurfaceBinaryOp::Union
                    | SurfaceBinaryOp::Difference
                    | SurfaceBinaryOp::Intersection => {
                        if l.arity() != r.arity() {
                            return Err(SigrunError::Translation(format!(
                                "set operator over arities {} and {}",
                                l.arity(),
                                r.arity()
                            )));
                        }
                    }
                    SurfaceBinaryOp::Join => {
                        if l.arity() + r.arity() < 3 {
                            return Err(SigrunError::Translation(
                                "join of two unary expressions".to_string(),
                            ));
                        }
                    }
                    SurfaceBinaryOp::Product => {}
                }
                Ok(match op {
                    SurfaceBinaryOp::Join => l.join(r),
                    SurfaceBinaryOp::Product => l.product(r),
                    SurfaceBinaryOp::Union => l.union(r),
                    SurfaceBinaryOp::Difference => l.difference(r),
                    SurfaceBinaryOp::Intersection => l.intersection(r),
                })
            }
        }
    }
}
