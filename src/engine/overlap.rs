// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Budget periods are half-open `[start, end)`: a period that starts on the day
//! another one ends does not overlap it.

use crate::errors::{LedgerError, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, params};

pub fn periods_overlap(s1: NaiveDate, e1: NaiveDate, s2: NaiveDate, e2: NaiveDate) -> bool {
    s1 < e2 && s2 < e1
}

/// First active budget of the same user and category whose period overlaps
/// `[start, end)`, skipping `exclude` (the budget being updated).
pub fn find_overlap(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    exclude: Option<i64>,
) -> Result<Option<(i64, NaiveDate, NaiveDate)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, start_date, end_date FROM budgets
         WHERE user_id=?1 AND category_id=?2 AND is_active=1
         ORDER BY start_date, id",
    )?;
    let rows = stmt.query_map(params![user_id, category_id], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, NaiveDate>(1)?,
            r.get::<_, NaiveDate>(2)?,
        ))
    })?;
    for row in rows {
        let (id, s, e) = row?;
        if Some(id) == exclude {
            continue;
        }
        if periods_overlap(start, end, s, e) {
            return Ok(Some((id, s, e)));
        }
    }
    Ok(None)
}

pub fn has_overlap(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    exclude: Option<i64>,
) -> Result<bool> {
    Ok(find_overlap(conn, user_id, category_id, start, end, exclude)?.is_some())
}

/// Range check first, then overlap; the two failures are reported separately.
pub fn check_period(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    exclude: Option<i64>,
) -> Result<()> {
    if start >= end {
        return Err(LedgerError::InvalidRange { start, end });
    }
    if let Some((budget_id, s, e)) =
        find_overlap(conn, user_id, category_id, start, end, exclude)?
    {
        return Err(LedgerError::Overlap {
            budget_id,
            start: s,
            end: e,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    #[test]
    fn back_to_back_periods_do_not_overlap() {
        assert!(!periods_overlap(d(1, 1), d(2, 1), d(2, 1), d(3, 1)));
        assert!(!periods_overlap(d(2, 1), d(3, 1), d(1, 1), d(2, 1)));
    }

    #[test]
    fn one_shared_day_overlaps() {
        assert!(periods_overlap(d(1, 1), d(2, 2), d(2, 1), d(3, 1)));
    }

    #[test]
    fn overlap_is_symmetric_and_matches_definition() {
        let days: Vec<NaiveDate> = (1..=6).map(|x| d(1, x)).collect();
        for &s1 in &days {
            for &e1 in &days {
                for &s2 in &days {
                    for &e2 in &days {
                        if s1 >= e1 || s2 >= e2 {
                            continue;
                        }
                        let expected = s1 < e2 && s2 < e1;
                        assert_eq!(periods_overlap(s1, e1, s2, e2), expected);
                        assert_eq!(periods_overlap(s2, e2, s1, e1), expected);
                    }
                }
            }
        }
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO categories(id,user_id,name,type) VALUES (1,1,'Food','Expense'),(2,1,'Rent','Expense');
             INSERT INTO budgets(id,user_id,category_id,name,amount,start_date,end_date) VALUES
               (10,1,1,'Jan food','300','2025-01-01','2025-02-01');
             INSERT INTO budgets(id,user_id,category_id,name,amount,start_date,end_date,is_active) VALUES
               (11,1,1,'Old food','300','2025-03-01','2025-04-01',0);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn store_check_ignores_inactive_other_category_and_self() {
        let conn = setup();
        assert!(has_overlap(&conn, 1, 1, d(1, 15), d(1, 20), None).unwrap());
        assert!(!has_overlap(&conn, 1, 1, d(1, 15), d(1, 20), Some(10)).unwrap());
        assert!(!has_overlap(&conn, 1, 2, d(1, 15), d(1, 20), None).unwrap());
        assert!(!has_overlap(&conn, 2, 1, d(1, 15), d(1, 20), None).unwrap());
        assert!(!has_overlap(&conn, 1, 1, d(3, 10), d(3, 20), None).unwrap());
    }

    #[test]
    fn invalid_range_is_distinct_from_overlap() {
        let conn = setup();
        let err = check_period(&conn, 1, 1, d(1, 10), d(1, 10), None).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRange { .. }));
        let err = check_period(&conn, 1, 1, d(1, 31), d(2, 10), None).unwrap_err();
        assert!(matches!(err, LedgerError::Overlap { budget_id: 10, .. }));
        check_period(&conn, 1, 1, d(2, 1), d(3, 1), None).unwrap();
    }
}
