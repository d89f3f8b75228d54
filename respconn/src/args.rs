//! Incrementally built argument vector for one command.

/// Borrowed argument spans staged for a single framed send.
///
/// Use when the argument count is not known upfront; otherwise pass a slice
/// straight to [`Connection::send`](crate::Connection::send).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs<'a> {
    argv: Vec<&'a [u8]>,
}

impl<'a> CommandArgs<'a> {
    pub fn new() -> Self {
        CommandArgs { argv: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        CommandArgs {
            argv: Vec::with_capacity(capacity),
        }
    }

    /// Appends one argument.
    pub fn push<A: AsRef<[u8]> + ?Sized>(&mut self, arg: &'a A) -> &mut Self {
        self.argv.push(arg.as_ref());
        self
    }

    /// Builder form of [`push`](Self::push).
    pub fn arg<A: AsRef<[u8]> + ?Sized>(mut self, arg: &'a A) -> Self {
        self.push(arg);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.argv.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    /// Argument spans in push order.
    #[inline]
    pub fn as_slice(&self) -> &[&'a [u8]] {
        &self.argv
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.argv.iter().copied()
    }
}

impl<'a> FromIterator<&'a [u8]> for CommandArgs<'a> {
    fn from_iter<I: IntoIterator<Item = &'a [u8]>>(iter: I) -> Self {
        CommandArgs {
            argv: iter.into_iter().collect(),
        }
    }
}

impl<'a> Extend<&'a [u8]> for CommandArgs<'a> {
    fn extend<I: IntoIterator<Item = &'a [u8]>>(&mut self, iter: I) {
        self.argv.extend(iter);
    }
}
