//! Runtime support for linking the layer as a static library.
//!
//! A `no_std` archive handed to a C toolchain must bring its own
//! `#[global_allocator]` and `#[panic_handler]`. Allocations go to newlib's
//! heap, next to the C side's. A panic ends the process.

use core::{
    alloc::{GlobalAlloc, Layout},
    ffi::{c_int, c_void},
    panic::PanicInfo,
};

/// Alignment `malloc` always honours on the console.
const MALLOC_ALIGN: usize = 8;

unsafe extern "C" {
    fn malloc(size: usize) -> *mut c_void;
    fn memalign(align: usize, size: usize) -> *mut c_void;
    fn free(ptr: *mut c_void);

    fn sceKernelExitProcess(status: c_int) -> c_int;
}

struct NewlibAllocator;

unsafe impl GlobalAlloc for NewlibAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: Plain heap allocation, a null result is passed on.
        let ptr = unsafe {
            if layout.align() <= MALLOC_ALIGN {
                malloc(layout.size())
            } else {
                memalign(layout.align(), layout.size())
            }
        };
        ptr.cast()
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        // SAFETY: `ptr` came from `alloc` above.
        unsafe { free(ptr.cast()) }
    }
}

#[global_allocator]
static ALLOCATOR: NewlibAllocator = NewlibAllocator;

#[panic_handler]
fn panic_handler(info: &PanicInfo) -> ! {
    log::error!("{info}");

    loop {
        // SAFETY: Ends the process, no pointers involved.
        unsafe { sceKernelExitProcess(-1) };
    }
}
