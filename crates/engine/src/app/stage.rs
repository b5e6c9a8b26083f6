#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceKind {
    Active,
    Backdrop,
    Paragraph,
    Tile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub id: InstanceId,
    pub kind: InstanceKind,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub text: Option<String>,
}

#[derive(Debug, Default)]
pub struct InstanceIdAllocator {
    next: u64,
}

impl InstanceIdAllocator {
    pub fn allocate(&mut self) -> InstanceId {
        let id = InstanceId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraBounds {
    pub x1: f32,
    pub x2: f32,
    pub y1: f32,
    pub y2: f32,
}

impl CameraBounds {
    fn clamp(&self, camera: Camera) -> Camera {
        Camera {
            x: camera.x.max(self.x1).min(self.x2.max(self.x1)),
            y: camera.y.max(self.y1).min(self.y2.max(self.y1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilemapRef {
    pub full_name: String,
    pub tilemap_name: String,
    pub layout_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceCounts {
    pub actives: usize,
    pub backdrops: usize,
    pub paragraphs: usize,
    pub tiles: usize,
}

/// Per-room world state. Everything here is wiped when the active room is swapped.
#[derive(Debug, Default)]
pub struct Stage {
    allocator: InstanceIdAllocator,
    actives: Vec<Instance>,
    backdrops: Vec<Instance>,
    paragraphs: Vec<Instance>,
    tiles: Vec<Instance>,
    backdrop_draw_order: Vec<InstanceId>,
    main_draw_order: Vec<InstanceId>,
    camera: Camera,
    camera_bounds: CameraBounds,
    camera_is_bound: bool,
    tilemap: Option<TilemapRef>,
}

impl Stage {
    pub fn add_active(&mut self, name: &str, x: f32, y: f32) -> InstanceId {
        let id = self.push(InstanceKind::Active, name, x, y, None);
        self.main_draw_order.push(id);
        id
    }

    pub fn add_backdrop(&mut self, name: &str, x: f32, y: f32) -> InstanceId {
        let id = self.push(InstanceKind::Backdrop, name, x, y, None);
        self.backdrop_draw_order.push(id);
        id
    }

    pub fn add_paragraph(&mut self, font: &str, x: f32, y: f32, text: &str) -> InstanceId {
        let id = self.push(InstanceKind::Paragraph, font, x, y, Some(text.to_string()));
        self.main_draw_order.push(id);
        id
    }

    pub fn add_tile(&mut self, name: &str, x: f32, y: f32) -> InstanceId {
        self.push(InstanceKind::Tile, name, x, y, None)
    }

    pub fn destroy(&mut self, id: InstanceId) -> bool {
        let before = self.instance_count();
        for list in [
            &mut self.actives,
            &mut self.backdrops,
            &mut self.paragraphs,
            &mut self.tiles,
        ] {
            list.retain(|instance| instance.id != id);
        }
        self.backdrop_draw_order.retain(|entry| *entry != id);
        self.main_draw_order.retain(|entry| *entry != id);
        self.instance_count() != before
    }

    pub fn find(&self, id: InstanceId) -> Option<&Instance> {
        self.actives
            .iter()
            .chain(&self.backdrops)
            .chain(&self.paragraphs)
            .chain(&self.tiles)
            .find(|instance| instance.id == id)
    }

    pub fn find_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.actives
            .iter_mut()
            .chain(&mut self.backdrops)
            .chain(&mut self.paragraphs)
            .chain(&mut self.tiles)
            .find(|instance| instance.id == id)
    }

    pub fn actives(&self) -> &[Instance] {
        &self.actives
    }

    pub fn backdrops(&self) -> &[Instance] {
        &self.backdrops
    }

    pub fn paragraphs(&self) -> &[Instance] {
        &self.paragraphs
    }

    pub fn tiles(&self) -> &[Instance] {
        &self.tiles
    }

    pub fn backdrop_draw_order(&self) -> &[InstanceId] {
        &self.backdrop_draw_order
    }

    pub fn main_draw_order(&self) -> &[InstanceId] {
        &self.main_draw_order
    }

    pub fn instance_counts(&self) -> InstanceCounts {
        InstanceCounts {
            actives: self.actives.len(),
            backdrops: self.backdrops.len(),
            paragraphs: self.paragraphs.len(),
            tiles: self.tiles.len(),
        }
    }

    pub fn instance_count(&self) -> usize {
        self.actives.len() + self.backdrops.len() + self.paragraphs.len() + self.tiles.len()
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn set_camera(&mut self, x: f32, y: f32) {
        let camera = Camera { x, y };
        self.camera = if self.camera_is_bound {
            self.camera_bounds.clamp(camera)
        } else {
            camera
        };
    }

    pub fn bind_camera(&mut self, bounds: CameraBounds) {
        self.camera_bounds = bounds;
        self.camera_is_bound = true;
        self.camera = bounds.clamp(self.camera);
    }

    pub fn unbind_camera(&mut self) {
        self.camera_is_bound = false;
    }

    pub fn camera_bounds(&self) -> Option<CameraBounds> {
        self.camera_is_bound.then_some(self.camera_bounds)
    }

    pub fn set_tilemap(&mut self, tilemap_name: &str, layout_name: &str) {
        self.tilemap = Some(TilemapRef {
            full_name: format!("{tilemap_name}_{layout_name}"),
            tilemap_name: tilemap_name.to_string(),
            layout_name: layout_name.to_string(),
        });
    }

    pub fn tilemap(&self) -> Option<&TilemapRef> {
        self.tilemap.as_ref()
    }

    /// Resets every container to empty. Instance ids keep counting up.
    pub fn clear(&mut self) {
        self.actives.clear();
        self.backdrops.clear();
        self.paragraphs.clear();
        self.tiles.clear();
        self.backdrop_draw_order.clear();
        self.main_draw_order.clear();
        self.camera = Camera::default();
        self.camera_bounds = CameraBounds::default();
        self.camera_is_bound = false;
        self.tilemap = None;
    }

    fn push(
        &mut self,
        kind: InstanceKind,
        name: &str,
        x: f32,
        y: f32,
        text: Option<String>,
    ) -> InstanceId {
        let id = self.allocator.allocate();
        let instance = Instance {
            id,
            kind,
            name: name.to_string(),
            x,
            y,
            text,
        };
        match kind {
            InstanceKind::Active => self.actives.push(instance),
            InstanceKind::Backdrop => self.backdrops.push(instance),
            InstanceKind::Paragraph => self.paragraphs.push(instance),
            InstanceKind::Tile => self.tiles.push(instance),
        }
        id
    }
}
