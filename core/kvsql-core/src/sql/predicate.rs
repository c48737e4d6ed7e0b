//! Predicate classification — WHERE fragments to storage-plan transitions.
//!
//! Operators live in a case-insensitive registry mapping the operator symbol
//! to a pure [`PlanRule`]. New operators register without touching the
//! built-in ones.

use crate::error::{KvsqlError, KvsqlResult};
use crate::sql::plan::QueryPlan;
use crate::storage::{Filter, UserKey};
use crate::value::Value;
use ahash::AHashMap;
use smallvec::{SmallVec, smallvec};

/// Built-in comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Gt,
    Lt,
    Between,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Between => "BETWEEN",
        }
    }
}

/// One `column <op> values` fragment of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    column: String,
    operator: String,
    values: SmallVec<[Value; 2]>,
}

impl Predicate {
    /// Operator symbols are matched case-insensitively.
    pub fn new<I>(column: impl Into<String>, operator: &str, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self {
            column: column.into(),
            operator: operator.to_ascii_uppercase(),
            values: values.into_iter().collect(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_operator(column, Operator::Eq, smallvec![value.into()])
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_operator(column, Operator::Gt, smallvec![value.into()])
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_operator(column, Operator::Lt, smallvec![value.into()])
    }

    pub fn between(column: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::with_operator(column, Operator::Between, smallvec![low.into(), high.into()])
    }

    fn with_operator(column: impl Into<String>, op: Operator, values: SmallVec<[Value; 2]>) -> Self {
        Self {
            column: column.into(),
            operator: op.symbol().to_string(),
            values,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn operand(&self, index: usize) -> KvsqlResult<&Value> {
        self.values
            .get(index)
            .ok_or_else(|| KvsqlError::invalid_value(&self.column, format!("missing operand #{index}")))
    }
}

/// Plan transition of one operator.
pub type PlanRule = fn(&OperatorRegistry, QueryPlan, &Predicate) -> KvsqlResult<QueryPlan>;

/// Case-insensitive operator symbol → [`PlanRule`] registry.
pub struct OperatorRegistry {
    primary_key_column: String,
    rules: AHashMap<String, PlanRule>,
}

impl OperatorRegistry {
    /// Registry with `=`, `>`, `<` and `BETWEEN` registered.
    pub fn new(primary_key_column: impl Into<String>) -> Self {
        let mut registry = Self {
            primary_key_column: primary_key_column.into(),
            rules: AHashMap::new(),
        };
        registry.register(Operator::Eq.symbol(), eq_rule);
        registry.register(Operator::Gt.symbol(), gt_rule);
        registry.register(Operator::Lt.symbol(), lt_rule);
        registry.register(Operator::Between.symbol(), between_rule);
        registry
    }

    pub fn register(&mut self, symbol: &str, rule: PlanRule) {
        self.rules.insert(symbol.to_ascii_uppercase(), rule);
    }

    pub fn primary_key_column(&self) -> &str {
        &self.primary_key_column
    }

    pub fn find(&self, symbol: &str) -> KvsqlResult<PlanRule> {
        self.rules
            .get(&symbol.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| KvsqlError::UnknownOperator(symbol.to_string()))
    }

    /// Apply `predicate` to the accumulated plan. Never touches storage.
    pub fn classify(&self, plan: QueryPlan, predicate: Predicate) -> KvsqlResult<QueryPlan> {
        self.apply(plan, &predicate)
    }

    fn apply(&self, plan: QueryPlan, predicate: &Predicate) -> KvsqlResult<QueryPlan> {
        let rule = self.find(predicate.operator())?;
        rule(self, plan, predicate)
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new("PK")
    }
}

fn eq_rule(registry: &OperatorRegistry, plan: QueryPlan, predicate: &Predicate) -> KvsqlResult<QueryPlan> {
    let value = predicate.operand(0)?;
    let column = predicate.column();

    if column == registry.primary_key_column() {
        let key = plan.key(UserKey::from_value(column, value)?);
        return Ok(plan.with_point_lookup(key));
    }

    let filter = match value {
        Value::Text(text) => Filter::equal_text(column, text.clone()),
        numeric => match numeric.to_i64_lossy() {
            Some(v) => Filter::equal_int(column, v),
            None => return Err(KvsqlError::invalid_value(column, numeric)),
        },
    };
    Ok(plan.with_filter(filter))
}

fn gt_rule(registry: &OperatorRegistry, plan: QueryPlan, predicate: &Predicate) -> KvsqlResult<QueryPlan> {
    let low = predicate.operand(0)?.clone();
    let rewritten = Predicate::between(predicate.column(), low, i64::MAX);
    registry.apply(plan, &rewritten)
}

fn lt_rule(registry: &OperatorRegistry, plan: QueryPlan, predicate: &Predicate) -> KvsqlResult<QueryPlan> {
    let high = predicate.operand(0)?.clone();
    let rewritten = Predicate::between(predicate.column(), i64::MIN, high);
    registry.apply(plan, &rewritten)
}

fn between_rule(_: &OperatorRegistry, plan: QueryPlan, predicate: &Predicate) -> KvsqlResult<QueryPlan> {
    let column = predicate.column();
    let bound = |index: usize| -> KvsqlResult<i64> {
        let value = predicate.operand(index)?;
        value
            .to_i64_lossy()
            .ok_or_else(|| KvsqlError::invalid_value(column, value))
    };
    let (low, high) = (bound(0)?, bound(1)?);
    Ok(plan.with_filter(Filter::range(column, low, high)))
}
