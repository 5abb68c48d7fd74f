use core::fmt;

/// An operand stack with maximum size enforcement in debug mode.
///
/// Each frame owns one, sized from its code object's `max_stack_size`. The
/// maximum is only enforced in debug builds to catch stack-depth accounting
/// bugs (in the assembler or the rewriter) during development.
///
/// # Examples
///
/// ```ignore
/// let mut stack = Stack::new(100);
/// stack.push(42);
/// stack.push(17);
/// assert_eq!(stack.pop(), Some(17));
/// assert_eq!(stack.peek(), Some(&42));
/// assert_eq!(stack.len(), 1);
/// ```
pub struct Stack<T> {
    /// The underlying storage for stack elements.
    items: Vec<T>,
    /// Maximum allowed stack size (enforced in debug mode only).
    max_size: usize,
}

impl<T> Stack<T> {
    /// Creates a new stack with the specified maximum size.
    ///
    /// Pre-allocates `min(max_size, 256)` slots.
    pub fn new(max_size: usize) -> Self {
        let initial_capacity = max_size.min(256);

        Self {
            items: Vec::with_capacity(initial_capacity),
            max_size,
        }
    }

    /// Pushes a value onto the stack.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the stack is already at maximum capacity.
    #[inline]
    pub fn push(&mut self, value: T) {
        debug_assert!(
            self.items.len() < self.max_size,
            "Stack overflow: attempted to push beyond maximum size of {}",
            self.max_size
        );
        self.items.push(value);
    }

    /// Removes and returns the top value, or `None` if the stack is empty.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Returns a reference to the top value without removing it.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Removes the top `n` values and collects them in push order.
    ///
    /// Returns `None` (leaving the stack untouched) if fewer than `n` values
    /// are present.
    pub fn pop_n<C: FromIterator<T>>(&mut self, n: usize) -> Option<C> {
        let len = self.items.len();
        if n > len {
            return None;
        }
        Some(self.items.drain(len - n..).collect())
    }

    /// Moves the top value down by `depth` positions.
    ///
    /// `rotate(1)` swaps the top two values; `rotate(2)` turns
    /// `[a, b, c]` into `[c, a, b]`. Returns `false` on underflow.
    pub fn rotate(&mut self, depth: usize) -> bool {
        let len = self.items.len();
        if depth >= len {
            return false;
        }
        self.items[len - depth - 1..].rotate_right(1);
        true
    }

    /// Returns an iterator over the stack from bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("items", &self.items)
            .field("max_size", &self.max_size)
            .finish()
    }
}
