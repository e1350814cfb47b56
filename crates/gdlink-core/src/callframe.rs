//! Call-frame marshaller
//!
//! A [`CallFrame`] lays out one pointer-call: every argument gets its own
//! 8-byte aligned slot in a word buffer, plus at most one zeroed return slot.
//! Pointers into the buffer are only taken once all slots are in place, right
//! before the call.

use crate::marshal::FrameValue;
use crate::variant::VariantType;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr;

#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: usize,
    ty: VariantType,
}

/// Typed token for a reserved return slot
#[derive(Debug)]
pub struct RetSlot<T> {
    offset: usize,
    _ty: PhantomData<T>,
}

impl<T> Clone for RetSlot<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RetSlot<T> {}

/// Transient argument buffer for one native call
#[derive(Debug, Default)]
pub struct CallFrame {
    words: Vec<u64>,
    args: Vec<Slot>,
    ret: Option<Slot>,
    pointers: Vec<*const c_void>,
}

fn words_for<T>() -> usize {
    size_of::<T>().div_ceil(8).max(1)
}

impl CallFrame {
    pub fn new() -> Self {
        Self::with_capacity(4)
    }

    /// Frame sized for `args` single-word arguments
    pub fn with_capacity(args: usize) -> Self {
        Self {
            words: Vec::with_capacity(args + 3),
            args: Vec::with_capacity(args),
            ret: None,
            pointers: Vec::with_capacity(args),
        }
    }

    fn reserve<T: FrameValue>(&mut self) -> usize {
        debug_assert!(align_of::<T>() <= 8);
        let offset = self.words.len();
        self.words.resize(offset + words_for::<T>(), 0);
        offset
    }

    /// Append one argument in its native representation
    pub fn arg<T: FrameValue>(&mut self, value: T) -> &mut Self {
        let offset = self.reserve::<T>();
        unsafe { ptr::write(self.words.as_mut_ptr().add(offset) as *mut T, value) };
        self.args.push(Slot {
            offset,
            ty: T::TYPE,
        });
        self
    }

    /// Reserve the zeroed return slot
    pub fn ret<T: FrameValue>(&mut self) -> RetSlot<T> {
        debug_assert!(self.ret.is_none(), "a call frame has one return slot");
        let offset = self.reserve::<T>();
        self.ret = Some(Slot {
            offset,
            ty: T::TYPE,
        });
        RetSlot {
            offset,
            _ty: PhantomData,
        }
    }

    /// Read the return slot back after the call
    pub fn get<T: FrameValue>(&self, slot: RetSlot<T>) -> T {
        unsafe { ptr::read(self.words.as_ptr().add(slot.offset) as *const T) }
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Argument tags in push order, and the return tag
    pub fn signature(&self) -> (Vec<VariantType>, Option<VariantType>) {
        (
            self.args.iter().map(|s| s.ty).collect(),
            self.ret.map(|s| s.ty),
        )
    }

    /// Argument pointer array and return pointer for the native call
    ///
    /// Valid until the frame is modified or dropped.
    pub fn raw_parts(&mut self) -> (*const *const c_void, *mut c_void) {
        let base = self.words.as_mut_ptr();
        self.pointers.clear();
        self.pointers.extend(
            self.args
                .iter()
                .map(|s| unsafe { base.add(s.offset) } as *const c_void),
        );
        let ret = match self.ret {
            Some(slot) => unsafe { base.add(slot.offset) as *mut c_void },
            None => ptr::null_mut(),
        };
        (self.pointers.as_ptr(), ret)
    }

    /// Release the buffer; dropping the frame does the same
    pub fn free(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Rect2, Vector2};
    use crate::native::ObjectPtr;

    #[test]
    fn test_slots_are_word_aligned() {
        let mut frame = CallFrame::new();
        frame
            .arg(true)
            .arg(Rect2::new(Vector2::new(1.0, 2.0), Vector2::new(3.0, 4.0)))
            .arg(7i64);
        let (args, ret) = frame.raw_parts();
        assert!(ret.is_null());
        unsafe {
            assert!(*(*args.add(0) as *const bool));
            let rect = *(*args.add(1) as *const Rect2);
            assert_eq!(rect.size, Vector2::new(3.0, 4.0));
            assert_eq!(*(*args.add(2) as *const i64), 7);
            for i in 0..3 {
                assert_eq!(*args.add(i) as usize % 8, 0);
            }
        }
    }

    #[test]
    fn test_ret_slot_reads_back() {
        let mut frame = CallFrame::new();
        frame.arg(ObjectPtr::NULL);
        let slot = frame.ret::<f64>();
        let (_, ret) = frame.raw_parts();
        unsafe { *(ret as *mut f64) = 2.5 };
        assert_eq!(frame.get(slot), 2.5);
        assert_eq!(
            frame.signature(),
            (vec![VariantType::Object], Some(VariantType::Float))
        );
        frame.free();
    }

    #[test]
    fn test_ret_slot_starts_zeroed() {
        let mut frame = CallFrame::new();
        let slot = frame.ret::<i64>();
        assert_eq!(frame.get(slot), 0);
    }
}
