/// Number of distinct agent color slots before indices start reusing.
pub const PALETTE_SIZE: u8 = 5;

/// Reserved display identity for the moderator. Never holds a palette slot.
pub const MODERATOR_ROLE: &str = "Moderator";

/// Index into the fixed agent palette, in `0..PALETTE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaletteSlot(pub u8);

/// Session-scoped agent color assignment: first appearance claims the next
/// slot in a cyclic counter, and the mapping holds until reset.
#[derive(Debug, Clone, Default)]
pub struct PaletteMap {
    assigned: Vec<(String, u8)>,
    next: u8,
}

impl PaletteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for `role`, assigning one on first sight.
    pub fn slot_for(&mut self, role: &str) -> PaletteSlot {
        if let Some((_, slot)) = self.assigned.iter().find(|(seen, _)| seen == role) {
            return PaletteSlot(*slot);
        }
        let slot = self.next;
        self.next = (self.next + 1) % PALETTE_SIZE;
        self.assigned.push((role.to_string(), slot));
        PaletteSlot(slot)
    }

    /// Read-only lookup; `None` until the role has appeared.
    pub fn get(&self, role: &str) -> Option<PaletteSlot> {
        self.assigned
            .iter()
            .find(|(seen, _)| seen == role)
            .map(|(_, slot)| PaletteSlot(*slot))
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Clears the mapping and restarts the cycle. Called on task submission
    /// and on explicit session clear.
    pub fn reset(&mut self) {
        self.assigned.clear();
        self.next = 0;
    }
}
