// Primitive number types usable as a receive buffer element.
pub trait Align1: bytemuck::Pod {}

impl Align1 for u8 {}
impl Align1 for u32 {}
impl Align1 for f32 {}
impl Align1 for u64 {}
impl Align1 for f64 {}

// Buffer elements aligned to at least 4 bytes, required to view `f32` payloads in place.
pub trait Align4: Align1 {}

impl Align4 for u32 {}
impl Align4 for f32 {}
impl Align4 for u64 {}
impl Align4 for f64 {}
