//! Flow order abstraction
//!
//! A sequencing run exposes the substrate to one nucleotide per flow,
//! following a fixed cyclic order. The engine only ever asks three things
//! of it: which nucleotide a flow expects, its dense integer code, and how
//! many flows there are in total.

use crate::EngineError;

/// One of the four nucleotides, with total mappings to and from characters
/// and a dense index usable for per-nucleotide table rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nuc {
    /// Adenine
    A,
    /// Cytosine
    C,
    /// Guanine
    G,
    /// Thymine
    T,
}

impl Nuc {
    /// All four nucleotides in index order.
    pub const ALL: [Nuc; 4] = [Nuc::A, Nuc::C, Nuc::G, Nuc::T];

    /// Dense index in 0..4, stable across the crate (table row order).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Nuc::A => 0,
            Nuc::C => 1,
            Nuc::G => 2,
            Nuc::T => 3,
        }
    }

    /// Inverse of [`Nuc::index`].
    #[inline]
    pub fn from_index(index: usize) -> Option<Nuc> {
        match index {
            0 => Some(Nuc::A),
            1 => Some(Nuc::C),
            2 => Some(Nuc::G),
            3 => Some(Nuc::T),
            _ => None,
        }
    }

    /// Uppercase ASCII letter for this nucleotide.
    #[inline]
    pub fn to_char(self) -> char {
        match self {
            Nuc::A => 'A',
            Nuc::C => 'C',
            Nuc::G => 'G',
            Nuc::T => 'T',
        }
    }

    /// Parse a single base character, accepting both cases.
    #[inline]
    pub fn from_char(c: char) -> Option<Nuc> {
        match c {
            'A' | 'a' => Some(Nuc::A),
            'C' | 'c' => Some(Nuc::C),
            'G' | 'g' => Some(Nuc::G),
            'T' | 't' => Some(Nuc::T),
            _ => None,
        }
    }
}

/// Per-flow expected nucleotide identity for an entire run.
///
/// Constructed from a short cycle string (e.g. `"TACG"`) expanded to the
/// requested number of flows. Immutable for the engine's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOrder {
    nucs: Vec<Nuc>,
    cycle: String,
}

impl FlowOrder {
    /// Expand `cycle` cyclically to `num_flows` flows.
    pub fn new(cycle: &str, num_flows: usize) -> Result<Self, EngineError> {
        if cycle.is_empty() || num_flows == 0 {
            return Err(EngineError::EmptyFlowOrder);
        }
        let cycle_nucs: Vec<Nuc> = cycle
            .chars()
            .map(|c| Nuc::from_char(c).ok_or(EngineError::InvalidFlowChar(c)))
            .collect::<Result<_, _>>()?;
        let nucs = (0..num_flows)
            .map(|flow| cycle_nucs[flow % cycle_nucs.len()])
            .collect();
        Ok(Self {
            nucs,
            cycle: cycle.to_uppercase(),
        })
    }

    /// Total number of flows.
    #[inline]
    pub fn num_flows(&self) -> usize {
        self.nucs.len()
    }

    /// Nucleotide expected at `flow`.
    #[inline]
    pub fn nuc_at(&self, flow: usize) -> Nuc {
        self.nucs[flow]
    }

    /// Integer-coded form of [`FlowOrder::nuc_at`].
    #[inline]
    pub fn int_at(&self, flow: usize) -> usize {
        self.nucs[flow].index()
    }

    /// The cycle string this order was expanded from.
    pub fn cycle(&self) -> &str {
        &self.cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nuc_mapping_is_total() {
        for nuc in Nuc::ALL {
            assert_eq!(Nuc::from_index(nuc.index()), Some(nuc));
            assert_eq!(Nuc::from_char(nuc.to_char()), Some(nuc));
        }
        assert_eq!(Nuc::from_index(4), None);
        assert_eq!(Nuc::from_char('N'), None);
    }

    #[test]
    fn flow_order_expands_cyclically() {
        let order = FlowOrder::new("TACG", 6).unwrap();
        assert_eq!(order.num_flows(), 6);
        assert_eq!(order.nuc_at(0), Nuc::T);
        assert_eq!(order.nuc_at(3), Nuc::G);
        assert_eq!(order.nuc_at(4), Nuc::T);
        assert_eq!(order.int_at(5), Nuc::A.index());
    }

    #[test]
    fn flow_order_rejects_bad_input() {
        assert!(matches!(
            FlowOrder::new("", 8),
            Err(EngineError::EmptyFlowOrder)
        ));
        assert!(matches!(
            FlowOrder::new("TXCG", 8),
            Err(EngineError::InvalidFlowChar('X'))
        ));
    }
}
