//! Logical channel table of a node
//!
//! Rows are indexed by peer: a gNB has one row per served UE (RNTI `r` maps
//! to row `r - 1`), a UE has a single row for its own channels. Each row has
//! a fixed number of columns and new entities take the lowest free column.

use isacsim_common::{Lcid, NodeRole, Rnti};

use crate::error::NodeError;
use crate::rlc::RlcEntity;

/// Fixed-capacity table of RLC entities
#[derive(Debug)]
pub struct LogicalChannelTable {
    role: NodeRole,
    rows: Vec<Vec<Option<RlcEntity>>>,
}

impl LogicalChannelTable {
    /// Creates a table with `num_rows` rows of `max_per_row` empty columns.
    /// A UE table always has exactly one row.
    pub fn new(role: NodeRole, num_rows: usize, max_per_row: usize) -> Self {
        let num_rows = match role {
            NodeRole::Gnb => num_rows,
            NodeRole::Ue => 1,
        };
        let rows = (0..num_rows)
            .map(|_| (0..max_per_row).map(|_| None).collect())
            .collect();
        Self { role, rows }
    }

    /// Number of peer rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Columns per row
    pub fn max_per_row(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Number of configured entities
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if no entity is configured
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn row_index(&self, peer: Rnti) -> Option<usize> {
        match self.role {
            NodeRole::Ue => Some(0),
            NodeRole::Gnb => usize::from(peer)
                .checked_sub(1)
                .filter(|&row| row < self.rows.len()),
        }
    }

    /// Entity serving `(peer, lcid)`
    pub fn get(&self, peer: Rnti, lcid: Lcid) -> Option<&RlcEntity> {
        let row = self.rows.get(self.row_index(peer)?)?;
        row.iter().flatten().find(|entity| entity.lcid() == lcid)
    }

    /// Mutable entity serving `(peer, lcid)`
    pub fn get_mut(&mut self, peer: Rnti, lcid: Lcid) -> Option<&mut RlcEntity> {
        let index = self.row_index(peer)?;
        let row = self.rows.get_mut(index)?;
        row.iter_mut().flatten().find(|entity| entity.lcid() == lcid)
    }

    /// Stores `entity` in the lowest free column of the peer's row and
    /// returns the column
    pub fn insert(&mut self, peer: Rnti, entity: RlcEntity) -> Result<usize, NodeError> {
        let rows = self.rows.len();
        let index = self
            .row_index(peer)
            .ok_or(NodeError::UnknownPeer { rnti: peer, rows })?;
        let row = &mut self.rows[index];

        let lcid = entity.lcid();
        if row.iter().flatten().any(|existing| existing.lcid() == lcid) {
            return Err(NodeError::DuplicateLogicalChannel { rnti: peer, lcid });
        }

        let max = row.len();
        let (column, slot) = row
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(NodeError::TooManyLogicalChannels { rnti: peer, max })?;
        *slot = Some(entity);
        Ok(column)
    }

    /// Entities of one peer row in column order; empty for an unknown peer
    pub fn row(&self, peer: Rnti) -> impl Iterator<Item = &RlcEntity> {
        self.row_index(peer)
            .and_then(|index| self.rows.get(index))
            .into_iter()
            .flatten()
            .flatten()
    }

    /// Every entity, row by row
    pub fn iter(&self) -> impl Iterator<Item = &RlcEntity> {
        self.rows.iter().flatten().flatten()
    }

    /// Every entity, mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RlcEntity> {
        self.rows.iter_mut().flatten().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isacsim_common::{LogicalChannelConfig, RlcEntityType};

    fn entity(rnti: Rnti, lcid: Lcid, role: NodeRole) -> RlcEntity {
        RlcEntity::new(
            rnti,
            &LogicalChannelConfig::new(RlcEntityType::UmBidirectional, lcid),
            role,
            16,
        )
    }

    #[test]
    fn test_gnb_rows_by_rnti() {
        let mut table = LogicalChannelTable::new(NodeRole::Gnb, 5, 4);
        assert_eq!(table.num_rows(), 5);
        assert_eq!(table.insert(5, entity(5, 2, NodeRole::Gnb)).unwrap(), 0);
        assert_eq!(table.insert(5, entity(5, 3, NodeRole::Gnb)).unwrap(), 1);

        assert_eq!(table.get(5, 2).unwrap().rnti(), 5);
        assert!(table.get(4, 2).is_none());
        assert_eq!(table.row(5).count(), 2);
        assert_eq!(table.row(3).count(), 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unknown_peer() {
        let mut table = LogicalChannelTable::new(NodeRole::Gnb, 2, 4);
        assert_eq!(
            table.insert(3, entity(3, 1, NodeRole::Gnb)),
            Err(NodeError::UnknownPeer { rnti: 3, rows: 2 })
        );
        assert_eq!(
            table.insert(0, entity(0, 1, NodeRole::Gnb)),
            Err(NodeError::UnknownPeer { rnti: 0, rows: 2 })
        );
        assert_eq!(table.row(0).count(), 0);
    }

    #[test]
    fn test_row_capacity_and_duplicates() {
        let mut table = LogicalChannelTable::new(NodeRole::Gnb, 1, 2);
        table.insert(1, entity(1, 1, NodeRole::Gnb)).unwrap();
        assert_eq!(
            table.insert(1, entity(1, 1, NodeRole::Gnb)),
            Err(NodeError::DuplicateLogicalChannel { rnti: 1, lcid: 1 })
        );
        table.insert(1, entity(1, 2, NodeRole::Gnb)).unwrap();
        assert_eq!(
            table.insert(1, entity(1, 3, NodeRole::Gnb)),
            Err(NodeError::TooManyLogicalChannels { rnti: 1, max: 2 })
        );
    }

    #[test]
    fn test_ue_single_row_ignores_peer() {
        let mut table = LogicalChannelTable::new(NodeRole::Ue, 7, 4);
        assert_eq!(table.num_rows(), 1);
        table.insert(9, entity(9, 4, NodeRole::Ue)).unwrap();
        assert!(table.get(9, 4).is_some());
        assert!(table.get(1, 4).is_some());
        assert_eq!(table.iter_mut().count(), 1);
    }
}
