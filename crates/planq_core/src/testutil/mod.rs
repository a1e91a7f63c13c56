//! Helpers for building catalogs and plans in tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use planq_error::{DbError, Result};

use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerRule, StatementParser};
use crate::arrays::Row;
use crate::arrays::datatype::DataType;
use crate::arrays::field::Field;
use crate::catalog::TableCapabilities;
use crate::catalog::index::{IndexCapabilities, IndexDef};
use crate::catalog::memory::{MemoryCatalog, MemoryDatabase, MemoryIndexRegistry, MemoryTable};
use crate::expr::{self, Expression};
use crate::logical::logical_delete::LogicalDelete;
use crate::logical::logical_insert::LogicalInsert;
use crate::logical::logical_scan::LogicalScan;
use crate::logical::logical_table::LogicalUnresolvedTable;
use crate::logical::logical_trigger::{
    LogicalCreateTrigger,
    TriggerEvent,
    TriggerOrder,
    TriggerTime,
};
use crate::logical::logical_update::{LogicalUpdate, LogicalUpdateSource};
use crate::logical::logical_values::LogicalValues;
use crate::logical::operator::{LogicalOperator, Node, PlanRef};
use crate::logical::scope::Scope;
use crate::logical::transform::inspect;

pub const TEST_DATABASE: &str = "mydb";

/// Parser returning plans registered ahead of time for exact statement text.
#[derive(Debug, Default)]
pub struct MapParser {
    statements: RwLock<HashMap<String, PlanRef>>,
}

impl MapParser {
    pub fn register(&self, statement: impl Into<String>, plan: PlanRef) {
        self.statements.write().insert(statement.into(), plan);
    }
}

impl StatementParser for MapParser {
    fn parse(&self, statement: &str) -> Result<PlanRef> {
        self.statements
            .read()
            .get(statement)
            .cloned()
            .ok_or_else(|| DbError::new("Unknown statement").with_field("statement", statement))
    }
}

/// An in-memory catalog with a single database, an index registry and a
/// statement parser.
#[derive(Debug)]
pub struct TestEnv {
    pub catalog: MemoryCatalog,
    pub database: Arc<MemoryDatabase>,
    pub indexes: MemoryIndexRegistry,
    pub parser: MapParser,
}

impl TestEnv {
    pub fn new() -> Self {
        let catalog = MemoryCatalog::new();
        let database = catalog.create_database(TEST_DATABASE);
        TestEnv {
            catalog,
            database,
            indexes: MemoryIndexRegistry::new(),
            parser: MapParser::default(),
        }
    }

    /// Environment with `mytable(i, f, t)` and `mytable2(i2, f2, t2)`.
    pub fn with_sample_tables() -> Self {
        let env = Self::new();
        env.add_table(
            "mytable",
            [
                Field::new("i", "", DataType::Int32, false),
                Field::new("f", "", DataType::Float64, true),
                Field::new("t", "", DataType::Utf8, true),
            ],
            vec![
                vec![1_i32.into(), 1.5_f64.into(), "a".into()],
                vec![2_i32.into(), 2.5_f64.into(), "b".into()],
                vec![3_i32.into(), 3.5_f64.into(), "c".into()],
            ],
        );
        env.add_table(
            "mytable2",
            [
                Field::new("i2", "", DataType::Int32, false),
                Field::new("f2", "", DataType::Float64, true),
                Field::new("t2", "", DataType::Utf8, true),
            ],
            vec![
                vec![1_i32.into(), 1.5_f64.into(), "x".into()],
                vec![3_i32.into(), 3.5_f64.into(), "y".into()],
            ],
        );
        env
    }

    pub fn add_table(
        &self,
        name: &str,
        fields: impl IntoIterator<Item = Field>,
        rows: Vec<Row>,
    ) -> Arc<MemoryTable> {
        self.add_memory_table(MemoryTable::new(name, fields).with_rows(rows))
    }

    pub fn add_memory_table(&self, table: MemoryTable) -> Arc<MemoryTable> {
        self.database.add_table(table)
    }

    pub fn table(&self, name: &str) -> Arc<MemoryTable> {
        match self.database.memory_table(name) {
            Some(table) => table,
            None => panic!("missing test table {name}"),
        }
    }

    pub fn add_index(
        &self,
        name: &str,
        table: &str,
        columns: &[&str],
        capabilities: IndexCapabilities,
    ) -> Arc<IndexDef> {
        self.indexes.add_index(IndexDef {
            name: name.to_string(),
            database: TEST_DATABASE.to_string(),
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            capabilities,
        })
    }

    /// Store a trigger built with [`create_trigger`], making its creation
    /// text parseable.
    pub fn add_trigger(&self, trigger: PlanRef) {
        let LogicalOperator::CreateTrigger(create) = trigger.as_ref() else {
            panic!("expected create trigger plan");
        };
        self.parser
            .register(create.node.create_statement.clone(), trigger.clone());
        self.database
            .add_trigger(create.node.name.clone(), create.node.create_statement.clone());
    }

    /// Store a trigger whose creation text parses to something other than a
    /// trigger definition.
    pub fn add_raw_trigger(&self, name: &str, statement: &str) {
        self.parser
            .register(statement, values_plan(vec![vec![expr::lit(1_i64)]]));
        self.database.add_trigger(name, statement);
    }

    /// Create a table with no rows and return a scan over it.
    pub fn scan(&self, name: &str, fields: impl IntoIterator<Item = Field>) -> PlanRef {
        self.scan_with_capabilities(name, fields, TableCapabilities::ALL)
    }

    pub fn scan_with_capabilities(
        &self,
        name: &str,
        fields: impl IntoIterator<Item = Field>,
        capabilities: TableCapabilities,
    ) -> PlanRef {
        self.add_memory_table(MemoryTable::new(name, fields).with_capabilities(capabilities));
        self.sample_scan(name)
    }

    /// Scan over an existing table.
    pub fn sample_scan(&self, name: &str) -> PlanRef {
        LogicalOperator::Scan(Node::new(self.sample_table_scan(name), Vec::new())).into_ref()
    }

    pub fn sample_table_scan(&self, name: &str) -> LogicalScan {
        LogicalScan::new(TEST_DATABASE, self.table(name))
    }

    pub fn context(&self) -> AnalysisContext<'_> {
        AnalysisContext {
            catalog: &self.catalog,
            indexes: &self.indexes,
            parser: &self.parser,
            current_database: TEST_DATABASE,
        }
    }

    pub fn analyzer(&self) -> Analyzer {
        Analyzer::default()
    }

    /// Run the default analyzer in an empty scope.
    pub fn analyze(&self, plan: &PlanRef) -> Result<PlanRef> {
        self.analyzer()
            .analyze(&self.context(), plan, &Scope::new())
    }

    /// Apply a single rule in an empty scope.
    pub fn apply_rule(&self, rule: &dyn AnalyzerRule, plan: &PlanRef) -> Result<PlanRef> {
        rule.apply(&self.analyzer(), &self.context(), plan, &Scope::new())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

pub fn values_plan(rows: Vec<Vec<Expression>>) -> PlanRef {
    LogicalOperator::Values(Node::new(LogicalValues { rows }, Vec::new())).into_ref()
}

pub fn unresolved_table(name: &str) -> PlanRef {
    LogicalOperator::UnresolvedTable(Node::new(
        LogicalUnresolvedTable {
            database: None,
            name: name.to_string(),
        },
        Vec::new(),
    ))
    .into_ref()
}

/// `INSERT INTO table VALUES ...` with full table rows.
pub fn insert_values(table: &str, rows: Vec<Vec<Expression>>) -> PlanRef {
    LogicalOperator::Insert(Node::new(
        LogicalInsert {
            columns: Vec::new(),
        },
        vec![unresolved_table(table), values_plan(rows)],
    ))
    .into_ref()
}

/// `DELETE FROM table`.
pub fn delete_from(table: &str) -> PlanRef {
    LogicalOperator::Delete(Node::new(LogicalDelete, vec![unresolved_table(table)])).into_ref()
}

/// `UPDATE table SET col = expr, ...` over every row.
pub fn update_set(table: &str, assignments: Vec<(&str, Expression)>) -> PlanRef {
    let assignments = assignments
        .into_iter()
        .map(|(column, value)| expr::set_field(expr::unresolved(None, column), value))
        .collect();

    let source = LogicalOperator::UpdateSource(Node::new(
        LogicalUpdateSource { assignments },
        vec![unresolved_table(table)],
    ))
    .into_ref();
    LogicalOperator::Update(Node::new(LogicalUpdate, vec![source])).into_ref()
}

/// A trigger definition with a generated creation statement.
pub fn create_trigger(
    name: &str,
    table: &str,
    event: TriggerEvent,
    time: TriggerTime,
    order: Option<TriggerOrder>,
    body: PlanRef,
) -> PlanRef {
    let mut create_statement = format!("CREATE TRIGGER {name} {time} {event} ON {table} FOR EACH ROW");
    if let Some(order) = &order {
        create_statement = format!("{create_statement} {order}");
    }

    LogicalOperator::CreateTrigger(Node::new(
        LogicalCreateTrigger {
            name: name.to_string(),
            table: table.to_string(),
            event,
            time,
            order,
            create_statement,
        },
        vec![body],
    ))
    .into_ref()
}

/// Descriptions of every decoration in the plan, parents first.
pub fn decorations(plan: &PlanRef) -> Vec<String> {
    let mut out = Vec::new();
    inspect(plan, &mut |node| {
        if let LogicalOperator::Decorated(decorated) = node.as_ref() {
            out.push(decorated.node.description.clone());
        }
        true
    });
    out
}

/// Column indexes referenced by the pushed filters of each scan that has
/// any, in plan order.
pub fn scan_filters(plan: &PlanRef) -> Vec<(String, Vec<usize>)> {
    let mut out = Vec::new();
    inspect(plan, &mut |node| {
        if let LogicalOperator::Scan(scan) = node.as_ref() {
            if !scan.node.filters.is_empty() {
                let indexes = scan
                    .node
                    .filters
                    .iter()
                    .flat_map(|f| f.column_refs().into_iter().map(|c| c.index))
                    .collect();
                out.push((scan.node.table_name().to_string(), indexes));
            }
        }
        true
    });
    out
}
