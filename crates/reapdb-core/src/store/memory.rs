use crate::{
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::{EntityRecord, EntityRef, LinkRef},
    spec::{Holder, Relation},
    store::{EntityStore, Savepoint},
};
use std::collections::{BTreeMap, BTreeSet};

///
/// UndoOp
///
/// Inverse of one applied write, replayed in reverse order on rollback.
///

#[derive(Clone, Debug)]
enum UndoOp {
    Restore(EntityRecord),
    Relink(LinkRef),
}

///
/// Transaction
///

#[derive(Debug, Default)]
struct Transaction {
    undo: Vec<UndoOp>,
    // undo-log length at each open savepoint
    savepoints: Vec<usize>,
}

///
/// MemoryStore
///
/// In-memory entity store with a reverse reference index and an undo log.
///
/// Every stored reference is a foreign key on its source row; deleting a
/// row that is still referenced fails with a constraint violation.
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: BTreeMap<EntityRef, EntityRecord>,
    // target -> {(source, field)}
    reverse: BTreeMap<EntityRef, BTreeSet<(EntityRef, &'static str)>>,
    txn: Option<Transaction>,
}

impl MemoryStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            reverse: BTreeMap::new(),
            txn: None,
        }
    }

    /// Insert one row. Every reference target must already exist.
    pub fn insert(&mut self, record: EntityRecord) -> Result<(), InternalError> {
        if self.rows.contains_key(&record.entity) {
            return Err(InternalError::new(
                ErrorClass::Conflict,
                ErrorOrigin::Store,
                format!("entity already exists: {}", record.entity),
            ));
        }
        if let Some(missing) = record
            .links()
            .map(|link| link.target)
            .find(|target| *target != record.entity && !self.rows.contains_key(target))
        {
            return Err(InternalError::store_not_found(missing));
        }

        self.restore_row(record);

        Ok(())
    }

    /// Add one reference to an existing row.
    pub fn link(&mut self, link: LinkRef) -> Result<(), InternalError> {
        if !self.rows.contains_key(&link.target) {
            return Err(InternalError::store_not_found(link.target));
        }
        let row = self
            .rows
            .get_mut(&link.source)
            .ok_or_else(|| InternalError::store_not_found(link.source))?;
        row.fields.entry(link.field).or_default().insert(link.target);
        self.reverse
            .entry(link.target)
            .or_default()
            .insert((link.source, link.field));

        Ok(())
    }

    #[must_use]
    pub fn contains(&self, entity: EntityRef) -> bool {
        self.rows.contains_key(&entity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// Every stored reference pointing at `target`.
    #[must_use]
    pub fn referrers(&self, target: EntityRef) -> Vec<LinkRef> {
        self.reverse
            .get(&target)
            .into_iter()
            .flatten()
            .map(|(source, field)| LinkRef::new(*source, *field, target))
            .collect()
    }

    fn restore_row(&mut self, record: EntityRecord) {
        for link in record.links() {
            self.reverse
                .entry(link.target)
                .or_default()
                .insert((link.source, link.field));
        }
        self.rows.insert(record.entity, record);
    }

    fn remove_reverse(&mut self, link: LinkRef) {
        if let Some(sources) = self.reverse.get_mut(&link.target) {
            sources.remove(&(link.source, link.field));
            if sources.is_empty() {
                self.reverse.remove(&link.target);
            }
        }
    }

    fn record_undo(&mut self, op: UndoOp) {
        if let Some(txn) = self.txn.as_mut() {
            txn.undo.push(op);
        }
    }

    // Replay undo ops in reverse until the log is `len` long.
    fn undo_to(&mut self, len: usize) {
        loop {
            let op = match self.txn.as_mut() {
                Some(txn) if txn.undo.len() > len => txn.undo.pop(),
                _ => None,
            };
            let Some(op) = op else {
                break;
            };

            match op {
                UndoOp::Restore(record) => self.restore_row(record),
                UndoOp::Relink(link) => {
                    if let Some(row) = self.rows.get_mut(&link.source) {
                        row.fields.entry(link.field).or_default().insert(link.target);
                    }
                    self.reverse
                        .entry(link.target)
                        .or_default()
                        .insert((link.source, link.field));
                }
            }
        }
    }

    fn txn_mut(&mut self) -> Result<&mut Transaction, InternalError> {
        self.txn
            .as_mut()
            .ok_or_else(|| InternalError::store_invariant("no transaction in progress"))
    }

    // Savepoint must be open; returns the undo-log mark it captured.
    fn take_savepoint(&mut self, savepoint: Savepoint) -> Result<usize, InternalError> {
        let txn = self.txn_mut()?;
        let Some(&mark) = txn.savepoints.get(savepoint.0) else {
            return Err(InternalError::store_invariant(format!(
                "savepoint {} is not open",
                savepoint.0
            )));
        };
        txn.savepoints.truncate(savepoint.0);

        Ok(mark)
    }
}

impl EntityStore for MemoryStore {
    fn get(&self, entity: EntityRef) -> Result<Option<EntityRecord>, InternalError> {
        Ok(self.rows.get(&entity).cloned())
    }

    fn children_of(
        &self,
        parent: EntityRef,
        relation: &Relation,
    ) -> Result<Vec<EntityRef>, InternalError> {
        let children: Vec<EntityRef> = match relation.holder {
            Holder::Parent => self
                .rows
                .get(&parent)
                .map(|row| {
                    row.targets(relation.field)
                        .filter(|target| target.kind == relation.child)
                        .collect()
                })
                .unwrap_or_default(),
            Holder::Child => self
                .referrers(parent)
                .into_iter()
                .filter(|link| link.source.kind == relation.child && link.field == relation.field)
                .map(|link| link.source)
                .collect(),
        };

        Ok(children)
    }

    fn parents_of(
        &self,
        child: EntityRef,
        relation: &Relation,
    ) -> Result<Vec<EntityRef>, InternalError> {
        let parents: Vec<EntityRef> = match relation.holder {
            Holder::Parent => self
                .referrers(child)
                .into_iter()
                .filter(|link| link.source.kind == relation.parent && link.field == relation.field)
                .map(|link| link.source)
                .collect(),
            Holder::Child => self
                .rows
                .get(&child)
                .map(|row| {
                    row.targets(relation.field)
                        .filter(|target| target.kind == relation.parent)
                        .collect()
                })
                .unwrap_or_default(),
        };

        Ok(parents)
    }

    fn delete(&mut self, entity: EntityRef) -> Result<(), InternalError> {
        if !self.rows.contains_key(&entity) {
            return Err(InternalError::store_not_found(entity));
        }
        if let Some(blocker) = self
            .referrers(entity)
            .into_iter()
            .find(|link| link.source != entity)
        {
            return Err(InternalError::constraint_violation(
                entity,
                blocker.source,
                blocker.field,
            ));
        }

        let Some(record) = self.rows.remove(&entity) else {
            return Err(InternalError::store_not_found(entity));
        };
        for link in record.links() {
            self.remove_reverse(link);
        }
        self.record_undo(UndoOp::Restore(record));

        Ok(())
    }

    fn unlink(&mut self, link: LinkRef) -> Result<(), InternalError> {
        let row = self
            .rows
            .get_mut(&link.source)
            .ok_or_else(|| InternalError::store_not_found(link.source))?;
        let removed = row
            .fields
            .get_mut(link.field)
            .is_some_and(|targets| targets.remove(&link.target));
        if !removed {
            return Err(InternalError::new(
                ErrorClass::NotFound,
                ErrorOrigin::Store,
                format!("link not found: {link}"),
            ));
        }

        self.remove_reverse(link);
        self.record_undo(UndoOp::Relink(link));

        Ok(())
    }

    fn null_field(&mut self, entity: EntityRef, field: &'static str) -> Result<(), InternalError> {
        let row = self
            .rows
            .get_mut(&entity)
            .ok_or_else(|| InternalError::store_not_found(entity))?;
        let targets = row.fields.remove(field).unwrap_or_default();

        for target in targets {
            let link = LinkRef::new(entity, field, target);
            self.remove_reverse(link);
            self.record_undo(UndoOp::Relink(link));
        }

        Ok(())
    }

    fn begin(&mut self) -> Result<(), InternalError> {
        if self.txn.is_some() {
            return Err(InternalError::store_invariant(
                "transaction already in progress",
            ));
        }
        self.txn = Some(Transaction::default());

        Ok(())
    }

    fn savepoint(&mut self) -> Result<Savepoint, InternalError> {
        let txn = self.txn_mut()?;
        let mark = txn.undo.len();
        txn.savepoints.push(mark);

        Ok(Savepoint(txn.savepoints.len() - 1))
    }

    fn rollback_to(&mut self, savepoint: Savepoint) -> Result<(), InternalError> {
        let mark = self.take_savepoint(savepoint)?;
        self.undo_to(mark);

        Ok(())
    }

    fn release(&mut self, savepoint: Savepoint) -> Result<(), InternalError> {
        self.take_savepoint(savepoint)?;

        Ok(())
    }

    fn commit(&mut self) -> Result<(), InternalError> {
        if self.txn.take().is_none() {
            return Err(InternalError::store_invariant("no transaction to commit"));
        }

        Ok(())
    }

    fn rollback(&mut self) -> Result<(), InternalError> {
        if self.txn.is_none() {
            return Err(InternalError::store_invariant("no transaction to roll back"));
        }
        self.undo_to(0);
        self.txn = None;

        Ok(())
    }
}
