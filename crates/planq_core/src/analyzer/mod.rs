//! Rule based plan analysis.
//!
//! An analyzer runs an ordered list of batches over a plan. Each batch is an
//! ordered list of rules that's reapplied until a full pass leaves the plan
//! unchanged, or until the batch's iteration cap is hit.

pub mod fix_indexes;
pub mod pushdown;
pub mod resolve;
pub mod triggers;

use std::fmt::Debug;
use std::sync::Arc;

use planq_error::Result;
use tracing::{debug, trace, warn};

use crate::catalog::Catalog;
use crate::catalog::index::IndexRegistry;
use crate::config::analyzer::AnalyzerConfig;
use crate::logical::operator::PlanRef;
use crate::logical::scope::Scope;

/// Parses statement text into an unresolved plan.
///
/// Used to recover trigger definitions from their stored creation text.
pub trait StatementParser: Debug + Sync + Send {
    fn parse(&self, statement: &str) -> Result<PlanRef>;
}

/// External capabilities available to rules during analysis.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub indexes: &'a dyn IndexRegistry,
    pub parser: &'a dyn StatementParser,
    /// Database unqualified table references resolve in.
    pub current_database: &'a str,
}

pub trait AnalyzerRule: Debug + Sync + Send {
    fn name(&self) -> &'static str;

    /// Apply the rule to `plan`, returning the same `PlanRef` if nothing
    /// changed.
    fn apply(
        &self,
        analyzer: &Analyzer,
        ctx: &AnalysisContext,
        plan: &PlanRef,
        scope: &Scope,
    ) -> Result<PlanRef>;
}

/// Ordered rules applied together until the plan stops changing.
#[derive(Debug)]
pub struct Batch {
    pub name: &'static str,
    /// Maximum number of passes over the rules.
    pub max_iterations: usize,
    pub rules: Vec<Box<dyn AnalyzerRule>>,
}

impl Batch {
    pub fn new(name: &'static str, max_iterations: usize, rules: Vec<Box<dyn AnalyzerRule>>) -> Self {
        Batch {
            name,
            max_iterations: max_iterations.max(1),
            rules,
        }
    }

    /// A batch whose rules run exactly once.
    pub fn once(name: &'static str, rules: Vec<Box<dyn AnalyzerRule>>) -> Self {
        Self::new(name, 1, rules)
    }

    pub fn eval(
        &self,
        analyzer: &Analyzer,
        ctx: &AnalysisContext,
        plan: &PlanRef,
        scope: &Scope,
    ) -> Result<PlanRef> {
        let mut current = plan.clone();

        for iteration in 1..=self.max_iterations {
            let before = current.clone();

            for rule in &self.rules {
                let next = rule.apply(analyzer, ctx, &current, scope)?;
                if !plan_unchanged(&current, &next) {
                    trace!(batch = self.name, rule = rule.name(), iteration, "rule changed plan");
                }
                current = next;
            }

            if plan_unchanged(&before, &current) {
                debug!(batch = self.name, iterations = iteration, "batch reached fixed point");
                return Ok(current);
            }
        }

        if self.max_iterations > 1 {
            warn!(
                batch = self.name,
                max_iterations = self.max_iterations,
                "batch did not reach a fixed point"
            );
        }

        Ok(current)
    }
}

fn plan_unchanged(a: &PlanRef, b: &PlanRef) -> bool {
    Arc::ptr_eq(a, b) || a == b
}

#[derive(Debug)]
pub struct Analyzer {
    config: AnalyzerConfig,
    batches: Vec<Batch>,
}

impl Analyzer {
    /// Create an analyzer running the default batches enabled by `config`.
    pub fn new(config: AnalyzerConfig) -> Self {
        let batches = default_batches(&config);
        Analyzer { config, batches }
    }

    pub fn with_batches(config: AnalyzerConfig, batches: Vec<Batch>) -> Self {
        Analyzer { config, batches }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Analyze a plan in the given scope.
    ///
    /// The first rule error aborts analysis.
    pub fn analyze(&self, ctx: &AnalysisContext, plan: &PlanRef, scope: &Scope) -> Result<PlanRef> {
        let mut current = plan.clone();
        for batch in &self.batches {
            current = batch.eval(self, ctx, &current, scope)?;
        }
        Ok(current)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

fn default_batches(config: &AnalyzerConfig) -> Vec<Batch> {
    let mut batches = vec![Batch::new(
        "resolution",
        config.max_batch_iterations,
        vec![
            Box::new(resolve::ResolveTables),
            Box::new(triggers::resolve_old_new::ResolveNewAndOldReferences),
            Box::new(resolve::ResolveColumns),
            Box::new(resolve::ResolveInsertRows),
        ],
    )];

    if config.enable_pushdown {
        let mut rules: Vec<Box<dyn AnalyzerRule>> = vec![
            Box::new(pushdown::filter::PushdownFilters),
            Box::new(pushdown::index::PushdownIndexes),
        ];
        if config.enable_indexed_joins {
            rules.push(Box::new(pushdown::indexed_join::PlanIndexedJoins));
        }
        rules.push(Box::new(pushdown::projection::PushdownProjections));

        batches.push(Batch::new("pushdown", config.max_batch_iterations, rules));
    }

    if config.apply_triggers {
        batches.push(Batch::once(
            "triggers",
            vec![Box::new(triggers::apply::ApplyTriggers)],
        ));
    }

    batches.push(Batch::once(
        "finalize",
        vec![Box::new(fix_indexes::FixFieldIndexes)],
    ));

    batches
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::logical::logical_filter::LogicalFilter;
    use crate::logical::operator::{LogicalOperator, Node};
    use crate::testutil::{TestEnv, values_plan};
    use crate::expr::lit;

    /// Wraps the plan in a filter on every application.
    #[derive(Debug, Default)]
    struct AlwaysWrap {
        calls: AtomicUsize,
    }

    impl AnalyzerRule for AlwaysWrap {
        fn name(&self) -> &'static str {
            "always_wrap"
        }

        fn apply(
            &self,
            _analyzer: &Analyzer,
            _ctx: &AnalysisContext,
            plan: &PlanRef,
            _scope: &Scope,
        ) -> Result<PlanRef> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(LogicalOperator::Filter(Node::new(
                LogicalFilter { filter: lit(true) },
                vec![plan.clone()],
            ))
            .into_ref())
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl AnalyzerRule for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn apply(
            &self,
            _analyzer: &Analyzer,
            _ctx: &AnalysisContext,
            _plan: &PlanRef,
            _scope: &Scope,
        ) -> Result<PlanRef> {
            Err(planq_error::DbError::new("rule failed"))
        }
    }

    #[test]
    fn batch_stops_at_iteration_cap() {
        let env = TestEnv::new();
        let analyzer = Analyzer::with_batches(AnalyzerConfig::default(), Vec::new());
        let batch = Batch::new("wrap", 3, vec![Box::new(AlwaysWrap::default())]);

        let plan = values_plan(vec![vec![lit(1_i64)]]);
        let out = batch
            .eval(&analyzer, &env.context(), &plan, &Scope::new())
            .unwrap();

        let mut depth = 0;
        let mut node = &out;
        while let LogicalOperator::Filter(n) = node.as_ref() {
            depth += 1;
            node = &n.children[0];
        }
        assert_eq!(3, depth);
    }

    #[test]
    fn batch_with_no_change_runs_once() {
        let env = TestEnv::new();
        let analyzer = Analyzer::with_batches(AnalyzerConfig::default(), Vec::new());
        let batch = Batch::new(
            "resolution",
            8,
            vec![Box::new(resolve::ResolveTables)],
        );

        let plan = values_plan(vec![vec![lit(1_i64)]]);
        let out = batch
            .eval(&analyzer, &env.context(), &plan, &Scope::new())
            .unwrap();
        assert!(Arc::ptr_eq(&plan, &out));
    }

    #[test]
    fn first_error_short_circuits() {
        let env = TestEnv::new();
        let wrap = AlwaysWrap::default();
        let analyzer = Analyzer::with_batches(
            AnalyzerConfig::default(),
            vec![
                Batch::once("fail", vec![Box::new(Failing)]),
                Batch::once("wrap", vec![Box::new(wrap)]),
            ],
        );

        let plan = values_plan(vec![vec![lit(1_i64)]]);
        let err = analyzer
            .analyze(&env.context(), &plan, &Scope::new())
            .unwrap_err();
        assert_eq!("rule failed", err.message());
    }

    #[test]
    fn default_batches_follow_config() {
        let names = |config: AnalyzerConfig| -> Vec<&'static str> {
            Analyzer::new(config).batches().iter().map(|b| b.name).collect()
        };

        assert_eq!(
            vec!["resolution", "pushdown", "triggers", "finalize"],
            names(AnalyzerConfig::default())
        );
        assert_eq!(
            vec!["resolution", "finalize"],
            names(AnalyzerConfig {
                enable_pushdown: false,
                apply_triggers: false,
                ..Default::default()
            })
        );
    }
}
