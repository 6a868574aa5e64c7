use ::roaring::RoaringTreemap;

use crate::bitmap::Bitmap;

impl Bitmap {
    /// Build from a `RoaringTreemap`.
    pub fn from_roaring(rb: &RoaringTreemap) -> Self {
        rb.iter().collect()
    }

    /// Convert this bitmap to a `RoaringTreemap`.
    pub fn to_roaring(&self) -> RoaringTreemap {
        self.iter().collect()
    }
}

impl From<&RoaringTreemap> for Bitmap {
    fn from(rb: &RoaringTreemap) -> Self {
        Self::from_roaring(rb)
    }
}

impl From<&Bitmap> for RoaringTreemap {
    fn from(bitmap: &Bitmap) -> Self {
        bitmap.to_roaring()
    }
}
