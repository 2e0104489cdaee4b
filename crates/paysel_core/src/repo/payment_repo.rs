//! Payment repository: filter counting, browsing and atomic bulk transitions.
//!
//! # Responsibility
//! - Resolve filter specifications into match counts and payment pages.
//! - Execute set-based status transitions in a single UPDATE statement.
//!
//! # Invariants
//! - Every bulk transition is gated on the required source status, so
//!   re-running a transition is a no-op rather than a double mutation.
//! - Transitions never run as per-row read-then-write loops.
//! - Due-date comparison relies on ISO-8601 text ordering.

use crate::model::payment::{NewPayment, Payment, PaymentId, PaymentStatus};
use crate::model::selection::FilterSpec;
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const PAYMENT_SELECT_SQL: &str = "SELECT
    id,
    status,
    due_date,
    amount_cents,
    description,
    created_at,
    updated_at
FROM payments";

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "status",
    "due_date",
    "amount_cents",
    "description",
    "created_at",
    "updated_at",
];

/// Query options for browsing payments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentListQuery {
    /// Status/due-date constraints; unset fields are unconstrained.
    pub filter: FilterSpec,
    /// Maximum rows to return.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Repository interface for payment queries and bulk mutations.
pub trait PaymentRepository {
    /// Inserts one payment and returns its assigned id.
    fn create_payment(&self, payment: &NewPayment) -> RepoResult<PaymentId>;
    /// Gets one payment by id.
    fn get_payment(&self, id: PaymentId) -> RepoResult<Option<Payment>>;
    /// Lists payments using filter and pagination options.
    fn list_payments(&self, query: &PaymentListQuery) -> RepoResult<Vec<Payment>>;
    /// Best-effort count of payments currently matching the filter.
    fn count_matching(&self, filter: &FilterSpec) -> RepoResult<u64>;
    /// Transitions every payment matching `filter`, currently in `from` and
    /// not listed in `excluded`, to `to`. One atomic UPDATE.
    fn transition_matching_excluding(
        &self,
        filter: &FilterSpec,
        excluded: &[PaymentId],
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> RepoResult<usize>;
    /// Transitions exactly the listed payments currently in `from` to `to`.
    /// An empty id list affects zero rows.
    fn transition_by_ids(
        &self,
        ids: &[PaymentId],
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> RepoResult<usize>;
}

/// SQLite-backed payment repository.
pub struct SqlitePaymentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePaymentRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "payments", REQUIRED_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl PaymentRepository for SqlitePaymentRepository<'_> {
    fn create_payment(&self, payment: &NewPayment) -> RepoResult<PaymentId> {
        self.conn.execute(
            "INSERT INTO payments (status, due_date, amount_cents, description)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                payment.status.as_str(),
                payment.due_date.as_deref(),
                payment.amount_cents,
                payment.description.as_deref(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_payment(&self, id: PaymentId) -> RepoResult<Option<Payment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PAYMENT_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_payment_row(row)?));
        }

        Ok(None)
    }

    fn list_payments(&self, query: &PaymentListQuery) -> RepoResult<Vec<Payment>> {
        let mut sql = format!("{PAYMENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        push_filter_clauses(&mut sql, &mut bind_values, &query.filter);

        sql.push_str(" ORDER BY id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut payments = Vec::new();

        while let Some(row) = rows.next()? {
            payments.push(parse_payment_row(row)?);
        }

        Ok(payments)
    }

    fn count_matching(&self, filter: &FilterSpec) -> RepoResult<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM payments WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        push_filter_clauses(&mut sql, &mut bind_values, filter);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn transition_matching_excluding(
        &self,
        filter: &FilterSpec,
        excluded: &[PaymentId],
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> RepoResult<usize> {
        let mut sql = String::from(
            "UPDATE payments
             SET
                status = ?,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE status = ?",
        );
        let mut bind_values: Vec<Value> = vec![
            Value::Text(to.as_str().to_string()),
            Value::Text(from.as_str().to_string()),
        ];

        push_filter_clauses(&mut sql, &mut bind_values, filter);
        push_excluded_ids(&mut sql, &mut bind_values, excluded);

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(changed)
    }

    fn transition_by_ids(
        &self,
        ids: &[PaymentId],
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut sql = String::from(
            "UPDATE payments
             SET
                status = ?,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE status = ? AND id IN (",
        );
        let mut bind_values: Vec<Value> = vec![
            Value::Text(to.as_str().to_string()),
            Value::Text(from.as_str().to_string()),
        ];
        push_id_placeholders(&mut sql, &mut bind_values, ids);
        sql.push(')');

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(changed)
    }
}

fn push_filter_clauses(sql: &mut String, bind_values: &mut Vec<Value>, filter: &FilterSpec) {
    if let Some(status) = filter.status.as_deref() {
        sql.push_str(" AND status = ?");
        bind_values.push(Value::Text(status.to_string()));
    }

    if let Some(due) = filter.due_date_on_or_before.as_deref() {
        // ISO dates order correctly as text.
        sql.push_str(" AND due_date IS NOT NULL AND due_date <= ?");
        bind_values.push(Value::Text(due.to_string()));
    }
}

fn push_excluded_ids(sql: &mut String, bind_values: &mut Vec<Value>, excluded: &[PaymentId]) {
    if excluded.is_empty() {
        return;
    }

    sql.push_str(" AND id NOT IN (");
    push_id_placeholders(sql, bind_values, excluded);
    sql.push(')');
}

fn push_id_placeholders(sql: &mut String, bind_values: &mut Vec<Value>, ids: &[PaymentId]) {
    for (index, id) in ids.iter().enumerate() {
        if index > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
        bind_values.push(Value::Integer(*id));
    }
}

fn parse_payment_row(row: &Row<'_>) -> RepoResult<Payment> {
    let status_text: String = row.get("status")?;
    let status = PaymentStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid payment status `{status_text}` in payments.status"
        ))
    })?;

    Ok(Payment {
        id: row.get("id")?,
        status,
        due_date: row.get("due_date")?,
        amount_cents: row.get("amount_cents")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
