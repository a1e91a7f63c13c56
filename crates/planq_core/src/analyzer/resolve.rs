//! Rules binding table and column names to catalog objects and positions.

use planq_error::{DbError, ErrorKind, Result};
use tracing::trace;

use super::{AnalysisContext, Analyzer, AnalyzerRule};
use crate::arrays::field::Schema;
use crate::arrays::scalar::ScalarValue;
use crate::expr::column_expr::{ColumnExpr, UnresolvedColumnExpr};
use crate::expr::{self, Expression};
use crate::logical::logical_insert::LogicalInsert;
use crate::logical::logical_project::LogicalProject;
use crate::logical::logical_scan::LogicalScan;
use crate::logical::operator::{LogicalNode, LogicalOperator, Node, PlanRef};
use crate::logical::scope::Scope;
use crate::logical::transform::{plan_is_resolved, transform_node_expressions, transform_up};

/// Replaces unresolved tables with scans of catalog tables.
#[derive(Debug, Clone, Copy)]
pub struct ResolveTables;

impl AnalyzerRule for ResolveTables {
    fn name(&self) -> &'static str {
        "resolve_tables"
    }

    fn apply(
        &self,
        _analyzer: &Analyzer,
        ctx: &AnalysisContext,
        plan: &PlanRef,
        _scope: &Scope,
    ) -> Result<PlanRef> {
        transform_up(plan, &mut |node| match node.as_ref() {
            LogicalOperator::UnresolvedTable(table) => {
                let db_name = table
                    .node
                    .database
                    .as_deref()
                    .unwrap_or(ctx.current_database);
                let database = ctx.catalog.database(db_name)?;
                let source = database.table(&table.node.name)?.ok_or_else(|| {
                    DbError::with_kind(ErrorKind::TableNotFound, "Missing table")
                        .with_field("database", db_name)
                        .with_field("table", &table.node.name)
                })?;
                trace!(database = %db_name, table = %table.node.name, "resolved table");

                Ok(LogicalOperator::Scan(Node::new(
                    LogicalScan::new(database.name(), source),
                    Vec::new(),
                ))
                .into_ref())
            }
            _ => Ok(node.clone()),
        })
    }
}

/// Binds unresolved column references to positions in `scope ++ children`.
///
/// Nodes whose inputs aren't resolved yet are left for a later pass.
#[derive(Debug, Clone, Copy)]
pub struct ResolveColumns;

impl AnalyzerRule for ResolveColumns {
    fn name(&self) -> &'static str {
        "resolve_columns"
    }

    fn apply(
        &self,
        _analyzer: &Analyzer,
        _ctx: &AnalysisContext,
        plan: &PlanRef,
        scope: &Scope,
    ) -> Result<PlanRef> {
        let scope_schema = scope.schema();

        transform_up(plan, &mut |node| {
            if node.is_resolved() {
                return Ok(node.clone());
            }
            let inputs_resolved = node
                .children()
                .iter()
                .all(|c| !matches!(c.as_ref(), LogicalOperator::UnresolvedTable(_)));
            if !inputs_resolved {
                return Ok(node.clone());
            }

            let schema = scope_schema.concat(&input_schema(node));
            transform_node_expressions(node, &mut |expr| match expr {
                Expression::UnresolvedColumn(col) => resolve_column(&schema, &col),
                other => Ok(other),
            })
        })
    }
}

/// Schema of the rows a node's expressions see, excluding the outer scope.
pub fn input_schema(node: &LogicalOperator) -> Schema {
    let schemas: Vec<_> = node
        .children()
        .iter()
        .enumerate()
        .filter(|(idx, _)| !node.is_opaque_child(*idx))
        .map(|(_, c)| c.output_schema())
        .collect();
    Schema::merge(&schemas)
}

pub fn resolve_column(schema: &Schema, col: &UnresolvedColumnExpr) -> Result<Expression> {
    let mut matches = schema
        .fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.matches(col.table.as_deref(), &col.column));

    let (index, field) = matches.next().ok_or_else(|| {
        DbError::with_kind(ErrorKind::ColumnNotFound, "Missing column")
            .with_field("column", col)
    })?;

    if col.table.is_none() && matches.next().is_some() {
        return Err(DbError::new("Ambiguous column reference").with_field("column", col));
    }

    Ok(Expression::Column(ColumnExpr {
        index,
        table: field.source.clone(),
        column: field.name.clone(),
        datatype: field.datatype,
        nullable: field.nullable,
    }))
}

/// Rewrites inserts with an explicit column list so their source produces
/// rows in the destination table's full layout.
///
/// Columns missing from the list are filled with NULL.
#[derive(Debug, Clone, Copy)]
pub struct ResolveInsertRows;

impl AnalyzerRule for ResolveInsertRows {
    fn name(&self) -> &'static str {
        "resolve_insert_rows"
    }

    fn apply(
        &self,
        _analyzer: &Analyzer,
        _ctx: &AnalysisContext,
        plan: &PlanRef,
        _scope: &Scope,
    ) -> Result<PlanRef> {
        transform_up(plan, &mut |node| match node.as_ref() {
            LogicalOperator::Insert(insert) if !insert.node.columns.is_empty() => {
                let [destination, source] = insert.get_two_children_exact()?;
                let LogicalOperator::Scan(scan) = destination.as_ref() else {
                    return Ok(node.clone());
                };
                if !plan_is_resolved(source) {
                    return Ok(node.clone());
                }

                let projected = project_insert_source(
                    scan.node.full_schema(),
                    &insert.node.columns,
                    source,
                )?;

                Ok(LogicalOperator::Insert(Node::new(
                    LogicalInsert {
                        columns: Vec::new(),
                    },
                    vec![destination.clone(), projected],
                ))
                .into_ref())
            }
            _ => Ok(node.clone()),
        })
    }
}

fn project_insert_source(
    destination: &Schema,
    columns: &[String],
    source: &PlanRef,
) -> Result<PlanRef> {
    let source_schema = source.output_schema();
    if source_schema.len() != columns.len() {
        return Err(DbError::new("Insert column count doesn't match source")
            .with_field("columns", columns.len())
            .with_field("source_columns", source_schema.len()));
    }

    for column in columns {
        if destination.position(None, column).is_none() {
            return Err(
                DbError::with_kind(ErrorKind::ColumnNotFound, "Missing insert column")
                    .with_field("column", column),
            );
        }
    }

    let projections = destination
        .fields
        .iter()
        .map(|field| {
            match columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&field.name))
            {
                Some(pos) => {
                    let source_field = &source_schema.fields[pos];
                    Expression::Column(ColumnExpr {
                        index: pos,
                        table: source_field.source.clone(),
                        column: source_field.name.clone(),
                        datatype: source_field.datatype,
                        nullable: source_field.nullable,
                    })
                }
                None => expr::lit(ScalarValue::Null),
            }
        })
        .collect();

    Ok(LogicalOperator::Project(Node::new(
        LogicalProject { projections },
        vec![source.clone()],
    ))
    .into_ref())
}
