// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::errors::IteratorError;
use std::collections::BTreeMap;
use weave_state_view::{Kv, SqlRow, SqlRows, StateIterator};

enum Cursor {
    Kv(Box<dyn StateIterator>),
    Sql(Box<dyn SqlRows>),
}

impl Cursor {
    fn release(&mut self) {
        match self {
            Cursor::Kv(iter) => iter.release(),
            Cursor::Sql(rows) => rows.close(),
        }
    }
}

/// Arena of the cursors opened by one transaction, addressed by small integer handles.
///
/// Handles start at 1 and increase monotonically for the lifetime of the registry, so a closed
/// handle is never handed out again and a stale handle can never reach another cursor.
pub struct IteratorRegistry {
    next_handle: i32,
    cursors: BTreeMap<i32, Cursor>,
}

impl Default for IteratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IteratorRegistry {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            cursors: BTreeMap::new(),
        }
    }

    pub fn open_kv(&mut self, iter: Box<dyn StateIterator>) -> Result<i32, IteratorError> {
        self.insert(Cursor::Kv(iter))
    }

    pub fn open_sql(&mut self, rows: Box<dyn SqlRows>) -> Result<i32, IteratorError> {
        self.insert(Cursor::Sql(rows))
    }

    fn insert(&mut self, cursor: Cursor) -> Result<i32, IteratorError> {
        let handle = self.next_handle;
        self.next_handle = handle
            .checked_add(1)
            .ok_or(IteratorError::HandlesExhausted)?;
        self.cursors.insert(handle, cursor);
        Ok(handle)
    }

    fn kv_cursor(&mut self, handle: i32) -> Result<&mut Box<dyn StateIterator>, IteratorError> {
        match self.cursors.get_mut(&handle) {
            Some(Cursor::Kv(iter)) => Ok(iter),
            Some(_) => Err(IteratorError::KindMismatch {
                handle,
                expected: "key-value",
            }),
            None => Err(IteratorError::UnknownHandle(handle)),
        }
    }

    fn sql_cursor(&mut self, handle: i32) -> Result<&mut Box<dyn SqlRows>, IteratorError> {
        match self.cursors.get_mut(&handle) {
            Some(Cursor::Sql(rows)) => Ok(rows),
            Some(_) => Err(IteratorError::KindMismatch {
                handle,
                expected: "sql",
            }),
            None => Err(IteratorError::UnknownHandle(handle)),
        }
    }

    pub fn kv_has_next(&mut self, handle: i32) -> Result<bool, IteratorError> {
        Ok(self.kv_cursor(handle)?.has_next())
    }

    pub fn kv_next(&mut self, handle: i32) -> Result<Option<Kv>, IteratorError> {
        self.kv_cursor(handle)?
            .next()
            .map_err(|error| IteratorError::Cursor {
                handle,
                message: format!("{:#}", error),
            })
    }

    pub fn sql_has_next(&mut self, handle: i32) -> Result<bool, IteratorError> {
        Ok(self.sql_cursor(handle)?.has_next())
    }

    pub fn sql_next(&mut self, handle: i32) -> Result<Option<SqlRow>, IteratorError> {
        self.sql_cursor(handle)?
            .next()
            .map_err(|error| IteratorError::Cursor {
                handle,
                message: format!("{:#}", error),
            })
    }

    /// Releases the cursor behind `handle`. Closing an unknown or already closed handle is an
    /// error.
    pub fn close(&mut self, handle: i32) -> Result<(), IteratorError> {
        let mut cursor = self
            .cursors
            .remove(&handle)
            .ok_or(IteratorError::UnknownHandle(handle))?;
        cursor.release();
        Ok(())
    }

    pub fn num_open(&self) -> usize {
        self.cursors.len()
    }

    /// Releases every cursor still open and returns the leaked handles in ascending order.
    pub fn release_all(&mut self) -> Vec<i32> {
        let cursors = std::mem::take(&mut self.cursors);
        cursors
            .into_iter()
            .map(|(handle, mut cursor)| {
                cursor.release();
                handle
            })
            .collect()
    }
}

impl Drop for IteratorRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}
