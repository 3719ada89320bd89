//! Presentation seam.
//!
//! Components return [`Notice`] values; a [`Presenter`] shows them.  The
//! binary uses a console presenter, tests collect notices in a `Vec`.

use quick_core::Notice;

/// Shows notices to the user.
pub trait Presenter: Send {
    fn present(&mut self, notice: &Notice);

    fn present_all(&mut self, notices: &[Notice]) {
        for notice in notices {
            self.present(notice);
        }
    }
}

impl Presenter for Vec<Notice> {
    fn present(&mut self, notice: &Notice) {
        self.push(notice.clone());
    }
}
