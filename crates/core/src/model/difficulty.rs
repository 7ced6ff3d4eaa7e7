use serde::{Deserialize, Serialize};

use super::DifficultyId;

/// A difficulty level as served by the collaborator API.
///
/// Immutable once fetched; callers display and select levels ordered by
/// [`DifficultyLevel::order`] ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyLevel {
    pub id: DifficultyId,
    pub name: String,
    pub code: String,
    pub max_number: u32,
    pub allow_carry: bool,
    pub allow_borrow: bool,
    pub operation_types: Vec<String>,
    pub order: i32,
}

impl DifficultyLevel {
    /// Sorts levels into their display/selection order.
    pub fn sort_for_display(levels: &mut [DifficultyLevel]) {
        levels.sort_by_key(|level| level.order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(id: i64, order: i32) -> DifficultyLevel {
        DifficultyLevel {
            id: DifficultyId::new(id),
            name: format!("Level {id}"),
            code: format!("L{id}"),
            max_number: 20,
            allow_carry: false,
            allow_borrow: false,
            operation_types: vec!["addition".into()],
            order,
        }
    }

    #[test]
    fn sorts_by_order_ascending() {
        let mut levels = vec![level(1, 3), level(2, 1), level(3, 2)];
        DifficultyLevel::sort_for_display(&mut levels);
        let orders: Vec<i32> = levels.iter().map(|l| l.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }
}
