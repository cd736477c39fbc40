use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::num::NonZeroU32;

/// Trait implemented by all resolved components stored in an [`Arena`].
pub trait Component {
    const DISPLAY_NAME: &'static str;
}

/// A reference to a [`Component`] stored in an [`Arena`]
pub struct Ref<R: Component>(NonZeroU32, PhantomData<R>);

impl<R: Component> Ref<R> {
    const fn from_inner(inner: NonZeroU32) -> Self {
        Self(inner, PhantomData)
    }

    pub(crate) fn index(self) -> usize {
        // u32 always fits into usize on the platforms we support
        self.0.get() as usize - 1
    }
}

// derive(...) does not work if R itself does not derive the trait, even though it is only "used"
// in the PhantomData; hence we have to manually implement required traits for the Ref type.

impl<R: Component> Copy for Ref<R> {}

impl<R: Component> Clone for Ref<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Component> fmt::Debug for Ref<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{} #{}>", R::DISPLAY_NAME, self.0)
    }
}

impl<R: Component> PartialEq for Ref<R> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<R: Component> Eq for Ref<R> {}

impl<R: Component> Hash for Ref<R> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// The table used while a schema is being resolved.
///
/// Slots are wrapped in `Option`s, since components often need to reference themselves (or each
/// other), and thus are constructed after the `Ref` itself.
pub(super) struct ConstructionTable<R: Component> {
    slots: Vec<Option<R>>,
}

impl<R: Component> Default for ConstructionTable<R> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<R: Component> ConstructionTable<R> {
    /// Creates a [`Ref`] which points to an absent, reserved slot in the table.
    pub(super) fn reserve(&mut self) -> Ref<R> {
        // Reserve a slot by inserting None
        self.slots.push(None);

        // We use the size for the ref's ID, which is non-zero after the push
        Self::ref_at(self.slots.len() - 1)
    }

    /// Inserts the `value` into the slot pointed to by `ref_`. Returns `ref_` for convenience.
    pub(super) fn insert(&mut self, ref_: Ref<R>, value: R) -> Ref<R> {
        self.slots[ref_.index()] = Some(value);
        ref_
    }

    /// Shorthand for `insert(reserve(), value)`
    pub(super) fn create(&mut self, value: R) -> Ref<R> {
        let ref_ = self.reserve();
        self.insert(ref_, value)
    }

    pub(super) fn get(&self, ref_: Ref<R>) -> Option<&R> {
        self.slots.get(ref_.index()).and_then(Option::as_ref)
    }

    pub(super) fn is_present(&self, ref_: Ref<R>) -> bool {
        self.get(ref_).is_some()
    }

    /// Converts this construction table to an [`Arena`]. If a component value is absent, the
    /// first reserved [`Ref`] that was never filled is returned instead.
    pub(super) fn into_arena(self) -> Result<Arena<R>, Ref<R>> {
        let mut items = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.into_iter().enumerate() {
            match slot {
                Some(item) => items.push(item),
                None => return Err(Self::ref_at(index)),
            }
        }
        Ok(Arena {
            items: items.into_boxed_slice(),
        })
    }

    fn ref_at(index: usize) -> Ref<R> {
        let id = u32::try_from(index + 1)
            .ok()
            .and_then(NonZeroU32::new)
            .unwrap_or(NonZeroU32::MAX);
        Ref::from_inner(id)
    }
}

/// The read-only component storage of a resolved schema.
///
/// Every [`Ref`] handed out by the resolver points into its arena, so lookups never fail.
pub struct Arena<R: Component> {
    items: Box<[R]>,
}

impl<R: Component> Arena<R> {
    pub fn get(&self, ref_: Ref<R>) -> &R {
        &self.items[ref_.index()]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ref<R>, &R)> {
        self.items.iter().enumerate().filter_map(|(index, item)| {
            let id = NonZeroU32::new(u32::try_from(index + 1).ok()?)?;
            Some((Ref::from_inner(id), item))
        })
    }
}

impl<R: Component + fmt::Debug> fmt::Debug for Arena<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}
