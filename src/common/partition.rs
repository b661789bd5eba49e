///
/// Block Partitioning Algorithm
/// See <https://www.rfc-editor.org/rfc/rfc6330.html#section-4.4.1.2>
///
/// `Partition[I, J]` splits I items into J groups: JL groups of IL = ceil(I/J)
/// items and JS groups of IS = floor(I/J) items. The same rule partitions the
/// object into source blocks (I = Kt, J = Z) and each symbol into sub-symbols
/// (I = T/Al, J = N).
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    il: u32,
    is: u32,
    jl: u32,
    js: u32,
}

impl Partition {
    /// Partition `nb_items` items into `nb_groups` groups
    pub fn new(nb_items: u64, nb_groups: u32) -> Partition {
        if nb_groups == 0 {
            log::error!("Partitioning into 0 groups");
            return Partition {
                il: 0,
                is: 0,
                jl: 0,
                js: 0,
            };
        }

        let il = num_integer::div_ceil(nb_items, nb_groups as u64) as u32;
        let is = num_integer::div_floor(nb_items, nb_groups as u64) as u32;
        let jl = (nb_items - is as u64 * nb_groups as u64) as u32;
        let js = nb_groups - jl;

        Partition { il, is, jl, js }
    }

    /// Number of groups in the large (i = 0) or small (i = 1) class
    pub fn num(&self, i: usize) -> u32 {
        match i {
            0 => self.jl,
            _ => self.js,
        }
    }

    /// Items per group in the large (i = 0) or small (i = 1) class
    pub fn size(&self, i: usize) -> u32 {
        match i {
            0 => self.il,
            _ => self.is,
        }
    }

    /// Total number of groups
    pub fn nb_groups(&self) -> u32 {
        self.jl + self.js
    }

    /// Items in group `index`. Groups `[0, JL)` belong to the large class.
    pub fn size_of(&self, index: u32) -> u32 {
        // A group with index == JL is already in the small class.
        if index >= self.jl {
            self.is
        } else {
            self.il
        }
    }

    /// Sum of the sizes of all groups before `index`
    pub fn offset_of(&self, index: u32) -> u64 {
        if index <= self.jl {
            index as u64 * self.il as u64
        } else {
            self.jl as u64 * self.il as u64 + (index - self.jl) as u64 * self.is as u64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Partition;

    #[test]
    pub fn partition_exact() {
        crate::tests::init();
        let part = Partition::new(12, 4);
        assert_eq!(part.num(0), 0);
        assert_eq!(part.num(1), 4);
        assert_eq!(part.size(1), 3);
        assert_eq!(part.nb_groups(), 4);
    }

    #[test]
    pub fn partition_uneven() {
        crate::tests::init();
        let part = Partition::new(10, 3);
        assert_eq!(part.size(0), 4);
        assert_eq!(part.size(1), 3);
        assert_eq!(part.num(0), 1);
        assert_eq!(part.num(1), 2);
        assert_eq!(
            (0..3).map(|i| part.size_of(i) as u64).sum::<u64>(),
            10u64
        );
    }

    #[test]
    pub fn partition_class_boundary() {
        crate::tests::init();
        let part = Partition::new(10, 3);
        // One large group, the group at index JL is the first small one.
        assert_eq!(part.size_of(0), 4);
        assert_eq!(part.size_of(1), 3);
        assert_eq!(part.offset_of(0), 0);
        assert_eq!(part.offset_of(1), 4);
        assert_eq!(part.offset_of(2), 7);
        assert_eq!(part.offset_of(3), 10);
    }
}
