use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use crate::models::Page;

/// PageTree
///
/// Arena view over every page of one domain. Nodes are addressed by index and linked through
/// a parent-id lookup, so a malformed tree (cycles, dangling parents) can be walked safely.
pub struct PageTree {
    pages: Vec<Page>,
    index: HashMap<Uuid, usize>,
    children: Vec<Vec<usize>>,
}

impl PageTree {
    pub fn new(mut pages: Vec<Page>) -> Self {
        pages.sort_by(|a, b| a.page_order.cmp(&b.page_order).then_with(|| a.title.cmp(&b.title)));
        let index: HashMap<Uuid, usize> = pages.iter().enumerate().map(|(i, p)| (p.id, i)).collect();

        let mut children = vec![Vec::new(); pages.len()];
        for (i, page) in pages.iter().enumerate() {
            if let Some(parent) = page.parent_id.and_then(|pid| index.get(&pid)) {
                children[*parent].push(i);
            }
        }

        Self { pages, index, children }
    }

    pub fn get(&self, id: Uuid) -> Option<&Page> {
        self.index.get(&id).map(|&i| &self.pages[i])
    }

    /// Every descendant of `id` in breadth-first order, excluding `id` itself.
    pub fn descendants(&self, id: Uuid) -> Vec<Uuid> {
        let Some(&start) = self.index.get(&id) else {
            return Vec::new();
        };

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();

        while let Some(node) = queue.pop_front() {
            for &child in &self.children[node] {
                if visited.insert(child) {
                    out.push(self.pages[child].id);
                    queue.push_back(child);
                }
            }
        }
        out
    }

    /// Descendants ordered so that every page precedes its parent.
    pub fn descendants_deepest_first(&self, id: Uuid) -> Vec<Uuid> {
        let mut ids = self.descendants(id);
        ids.reverse();
        ids
    }

    /// True when re-parenting `page_id` under `new_parent` would make the page its own ancestor.
    pub fn would_create_cycle(&self, page_id: Uuid, new_parent: Uuid) -> bool {
        page_id == new_parent || self.descendants(page_id).contains(&new_parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: u128, parent: Option<u128>) -> Page {
        Page {
            id: Uuid::from_u128(id),
            parent_id: parent.map(Uuid::from_u128),
            title: format!("p{id}"),
            slug: format!("p{id}"),
            ..Default::default()
        }
    }

    fn sample() -> PageTree {
        // 1 ─┬─ 2 ── 4 ── 5
        //    └─ 3
        // 6
        PageTree::new(vec![
            page(1, None),
            page(2, Some(1)),
            page(3, Some(1)),
            page(4, Some(2)),
            page(5, Some(4)),
            page(6, None),
        ])
    }

    #[test]
    fn descendants_are_breadth_first() {
        let tree = sample();
        let ids: Vec<u128> = tree.descendants(Uuid::from_u128(1)).iter().map(|u| u.as_u128()).collect();
        assert_eq!(ids, vec![2, 3, 4, 5]);
        assert!(tree.descendants(Uuid::from_u128(6)).is_empty());
    }

    #[test]
    fn deepest_first_puts_children_before_parents() {
        let tree = sample();
        let order = tree.descendants_deepest_first(Uuid::from_u128(1));
        let pos = |n: u128| order.iter().position(|u| *u == Uuid::from_u128(n)).unwrap();
        assert!(pos(5) < pos(4));
        assert!(pos(4) < pos(2));
    }

    #[test]
    fn cycle_detection() {
        let tree = sample();
        let id = Uuid::from_u128;
        assert!(tree.would_create_cycle(id(2), id(2)));
        assert!(tree.would_create_cycle(id(2), id(5)));
        assert!(!tree.would_create_cycle(id(2), id(3)));
        assert!(!tree.would_create_cycle(id(5), id(1)));
    }

    #[test]
    fn malformed_cycles_terminate() {
        let tree = PageTree::new(vec![page(1, Some(2)), page(2, Some(1))]);
        assert_eq!(tree.descendants(Uuid::from_u128(1)), vec![Uuid::from_u128(2)]);
        assert!(tree.would_create_cycle(Uuid::from_u128(1), Uuid::from_u128(2)));
    }
}
