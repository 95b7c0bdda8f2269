use crate::config::Config;

/// One page worth of program text, `page_size` cells
pub type Page = Vec<String>;

/// Build a page of blank cells
pub fn empty_page(page_size: usize) -> Page {
    vec![String::new(); page_size]
}

/// Simulated main memory: `frame_count` frames of `page_size` text cells.
///
/// Frame ownership is tracked explicitly, so a resident page whose cells
/// happen to be blank never looks free.
pub struct MainMemory {
    cells: Vec<String>,
    occupied: Vec<bool>,
    page_size: usize,
}

impl MainMemory {
    /// Create a new main memory with every cell blank and every frame free
    pub fn new(config: &Config) -> Self {
        let frames = config.frame_count();
        MainMemory {
            cells: vec![String::new(); frames * config.page_size],
            occupied: vec![false; frames],
            page_size: config.page_size,
        }
    }

    /// Read a cell
    #[inline]
    pub fn read(&self, address: usize) -> &str {
        &self.cells[address]
    }

    /// Write a cell
    #[inline]
    pub fn write(&mut self, address: usize, value: impl Into<String>) {
        self.cells[address] = value.into();
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn frame_count(&self) -> usize {
        self.occupied.len()
    }

    /// Calculate the starting address of a frame
    #[inline]
    pub fn frame_to_address(&self, frame: usize) -> usize {
        frame * self.page_size
    }

    /// Lowest-numbered frame not holding a resident page
    pub fn free_frame(&self) -> Option<usize> {
        self.occupied.iter().position(|&used| !used)
    }

    pub fn is_occupied(&self, frame: usize) -> bool {
        self.occupied[frame]
    }

    /// Copy a page into a frame and mark the frame in use
    pub fn load_frame(&mut self, frame: usize, page: Page) {
        assert_eq!(page.len(), self.page_size, "page does not match the frame size");
        let base = self.frame_to_address(frame);
        for (i, cell) in page.into_iter().enumerate() {
            self.cells[base + i] = cell;
        }
        self.occupied[frame] = true;
    }

    /// Copy a frame's cells out
    pub fn read_frame(&self, frame: usize) -> Page {
        let base = self.frame_to_address(frame);
        self.cells[base..base + self.page_size].to_vec()
    }

    /// Blank a frame and hand it back to the free pool
    pub fn release_frame(&mut self, frame: usize) {
        let base = self.frame_to_address(frame);
        for cell in &mut self.cells[base..base + self.page_size] {
            cell.clear();
        }
        self.occupied[frame] = false;
    }
}
