//! Problem adapters: wrap a user-supplied collision or claw problem into a
//! single self-map F_i of the iteration space, parameterised by a version i.
//!
//! The search engine never sees `f` and `g` directly. It iterates through one
//! of three wrappers, each of which composes the user functions with the
//! version permutation σ_i(x) = i ⊕ x so that every round explores a freshly
//! randomised function graph:
//!
//! - [`CollisionMix`]: single f with |range| ≥ |domain|.
//! - [`EqualClawMix`]: claw (f, g) with |domain| = |range|; a keyed selector
//!   bit decides which of the two functions a point belongs to.
//! - [`WideClawMix`]: claw (f, g) with |domain| < |range|; the mix discards
//!   high bits and the parity bit selects the function.

/// A collision problem: find x ≠ y with f(x) = f(y) and `is_good_pair(x, y)`.
///
/// Requires `m_bits() >= n_bits()`. `f` must accept any value of `m_bits()`
/// bits (the iteration roams the whole range).
pub trait CollisionProblem: Sync {
    fn n_bits(&self) -> u32;
    fn m_bits(&self) -> u32;
    fn f(&self, x: u64) -> u64;
    fn is_good_pair(&self, x0: u64, x1: u64) -> bool;
}

/// A claw problem: find (x0, x1) with f(x0) = g(x1) and `is_good_pair(x0, x1)`.
///
/// Requires `m_bits() >= n_bits()`.
pub trait ClawProblem: Sync {
    fn n_bits(&self) -> u32;
    fn m_bits(&self) -> u32;
    fn f(&self, x: u64) -> u64;
    fn g(&self, x: u64) -> u64;
    fn is_good_pair(&self, x0: u64, x1: u64) -> bool;
}

/// The capability seam between a wrapped problem and the search machinery.
///
/// One instance per worker thread per round; instances are cheap clones
/// sharing the underlying problem by reference. `mixf` is the only method
/// that counts as an evaluation.
pub trait MixedProblem: Clone + Send {
    /// Bits of the iteration space; F_i maps {0,1}^space_bits into itself.
    fn space_bits(&self) -> u32;

    /// σ_i applied to x, composed with any domain narrowing the mode needs.
    fn mix(&self, i: u64, x: u64) -> u64;

    /// One iteration step: F_i(x). Increments the evaluation counter.
    fn mixf(&mut self, i: u64, x: u64) -> u64;

    /// True iff a and b sit on the same side of a claw (both f or both g).
    /// Always false in collision mode.
    fn same_side(&self, i: u64, a: u64, b: u64) -> bool;

    /// Validate a colliding pair against the user predicate, after un-mixing
    /// and (for claws) canonicalising the sides.
    fn mix_good_pair(&mut self, i: u64, a: u64, b: u64) -> bool;

    /// Un-mix a validated pair for output: collision mode returns
    /// (σ_i(a), σ_i(b)); claw modes return (f-side, g-side) in the original
    /// domain.
    fn output_pair(&self, i: u64, a: u64, b: u64) -> (u64, u64);

    /// Drain the evaluation count accumulated since the last call.
    fn take_evals(&mut self) -> u64;

    /// All-ones mask of the iteration space.
    fn space_mask(&self) -> u64 {
        mask(self.space_bits())
    }
}

#[inline]
fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Collision wrapper: iterate x ← f(i ⊕ x) over the m-bit range of f.
pub struct CollisionMix<'p, P> {
    pb: &'p P,
    n_eval: u64,
}

impl<'p, P> Clone for CollisionMix<'p, P> {
    fn clone(&self) -> Self {
        CollisionMix { pb: self.pb, n_eval: 0 }
    }
}

impl<'p, P: CollisionProblem> CollisionMix<'p, P> {
    pub fn new(pb: &'p P) -> Self {
        CollisionMix { pb, n_eval: 0 }
    }
}

impl<'p, P: CollisionProblem> MixedProblem for CollisionMix<'p, P> {
    fn space_bits(&self) -> u32 {
        self.pb.m_bits()
    }

    fn mix(&self, i: u64, x: u64) -> u64 {
        i ^ x
    }

    fn mixf(&mut self, i: u64, x: u64) -> u64 {
        self.n_eval += 1;
        self.pb.f(self.mix(i, x))
    }

    fn same_side(&self, _i: u64, _a: u64, _b: u64) -> bool {
        false
    }

    fn mix_good_pair(&mut self, i: u64, a: u64, b: u64) -> bool {
        self.pb.is_good_pair(self.mix(i, a), self.mix(i, b))
    }

    fn output_pair(&self, i: u64, a: u64, b: u64) -> (u64, u64) {
        (self.mix(i, a), self.mix(i, b))
    }

    fn take_evals(&mut self) -> u64 {
        std::mem::take(&mut self.n_eval)
    }
}

/// Equal-size claw wrapper (n = m). A keyed selector bit partitions the
/// space into an f-half and a g-half; the partition changes with the
/// version so that no (x0, x1) pair is starved forever.
pub struct EqualClawMix<'p, P> {
    pb: &'p P,
    n_eval: u64,
}

impl<'p, P> Clone for EqualClawMix<'p, P> {
    fn clone(&self) -> Self {
        EqualClawMix { pb: self.pb, n_eval: 0 }
    }
}

impl<'p, P: ClawProblem> EqualClawMix<'p, P> {
    pub fn new(pb: &'p P) -> Self {
        debug_assert_eq!(pb.n_bits(), pb.m_bits());
        EqualClawMix { pb, n_eval: 0 }
    }

    /// Selector: true ⇒ f, false ⇒ g.
    fn choose(&self, i: u64, x: u64) -> bool {
        (x.wrapping_mul(i | 1) >> (self.pb.m_bits() - 1)) & 1 == 1
    }

    /// Reorder (a, b) so the first element is the f-side.
    fn swap(&self, i: u64, a: u64, b: u64) -> (u64, u64) {
        let x0 = if self.choose(i, a) { a } else { b };
        let x1 = if self.choose(i, b) { a } else { b };
        debug_assert!(self.choose(i, x0));
        debug_assert!(!self.choose(i, x1));
        (x0, x1)
    }
}

impl<'p, P: ClawProblem> MixedProblem for EqualClawMix<'p, P> {
    fn space_bits(&self) -> u32 {
        self.pb.m_bits()
    }

    fn mix(&self, i: u64, x: u64) -> u64 {
        i ^ x
    }

    fn mixf(&mut self, i: u64, x: u64) -> u64 {
        self.n_eval += 1;
        let y = self.mix(i, x);
        if self.choose(i, x) {
            self.pb.f(y)
        } else {
            self.pb.g(y)
        }
    }

    fn same_side(&self, i: u64, a: u64, b: u64) -> bool {
        self.choose(i, a) == self.choose(i, b)
    }

    fn mix_good_pair(&mut self, i: u64, a: u64, b: u64) -> bool {
        if self.same_side(i, a, b) {
            return false;
        }
        let (x0, x1) = self.swap(i, a, b);
        self.pb.is_good_pair(self.mix(i, x0), self.mix(i, x1))
    }

    fn output_pair(&self, i: u64, a: u64, b: u64) -> (u64, u64) {
        let (x0, x1) = self.swap(i, a, b);
        (self.mix(i, x0), self.mix(i, x1))
    }

    fn take_evals(&mut self) -> u64 {
        std::mem::take(&mut self.n_eval)
    }
}

/// Larger-range claw wrapper (n < m). Iteration runs over the m-bit range;
/// the mix drops the m − n high bits to land back in the n-bit domain, and
/// the parity bit of the un-mixed point selects f or g.
pub struct WideClawMix<'p, P> {
    pb: &'p P,
    n_eval: u64,
}

impl<'p, P> Clone for WideClawMix<'p, P> {
    fn clone(&self) -> Self {
        WideClawMix { pb: self.pb, n_eval: 0 }
    }
}

impl<'p, P: ClawProblem> WideClawMix<'p, P> {
    pub fn new(pb: &'p P) -> Self {
        debug_assert!(pb.n_bits() < pb.m_bits());
        WideClawMix { pb, n_eval: 0 }
    }

    fn choose(&self, _i: u64, x: u64) -> bool {
        x & 1 == 1
    }

    fn swap(&self, i: u64, a: u64, b: u64) -> (u64, u64) {
        let x0 = if self.choose(i, a) { a } else { b };
        let x1 = if self.choose(i, b) { a } else { b };
        (x0, x1)
    }
}

impl<'p, P: ClawProblem> MixedProblem for WideClawMix<'p, P> {
    fn space_bits(&self) -> u32 {
        self.pb.m_bits()
    }

    fn mix(&self, i: u64, x: u64) -> u64 {
        (i ^ x) >> (self.pb.m_bits() - self.pb.n_bits())
    }

    fn mixf(&mut self, i: u64, x: u64) -> u64 {
        self.n_eval += 1;
        let y = self.mix(i, x);
        if self.choose(i, x) {
            self.pb.f(y)
        } else {
            self.pb.g(y)
        }
    }

    fn same_side(&self, i: u64, a: u64, b: u64) -> bool {
        self.choose(i, a) == self.choose(i, b)
    }

    fn mix_good_pair(&mut self, i: u64, a: u64, b: u64) -> bool {
        if self.same_side(i, a, b) {
            return false;
        }
        let (x0, x1) = self.swap(i, a, b);
        self.pb.is_good_pair(self.mix(i, x0), self.mix(i, x1))
    }

    fn output_pair(&self, i: u64, a: u64, b: u64) -> (u64, u64) {
        let (x0, x1) = self.swap(i, a, b);
        (self.mix(i, x0), self.mix(i, x1))
    }

    fn take_evals(&mut self) -> u64 {
        std::mem::take(&mut self.n_eval)
    }
}
