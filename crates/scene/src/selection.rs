use foundation::{FeatureId, LayerId};

/// The single selected feature, if any, across every layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Unselected,
    Selected { feature: FeatureId, layer: LayerId },
}

/// A `(feature, layer)` pair whose `isSelected` flag must change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRef {
    pub feature: FeatureId,
    pub layer: LayerId,
}

/// What a selection transition asks the caller to do.
///
/// Clear `clear` first, then flag `select`. When `notify` is set the observer
/// gets the new bag (or `null` when `select` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transition {
    pub clear: Option<FeatureRef>,
    pub select: Option<FeatureRef>,
    pub notify: bool,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        self.clear.is_none() && self.select.is_none() && !self.notify
    }
}

/// Selection state machine: `Unselected` or `Selected(feature, layer)`.
///
/// It only decides flags. Layer membership belongs to whoever owns the layers.
#[derive(Debug, Clone, Default)]
pub struct SelectionCoordinator {
    state: Selection,
}

impl SelectionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &Selection {
        &self.state
    }

    pub fn selected(&self) -> Option<FeatureRef> {
        match &self.state {
            Selection::Unselected => None,
            Selection::Selected { feature, layer } => Some(FeatureRef {
                feature: feature.clone(),
                layer: *layer,
            }),
        }
    }

    /// Pointer hit on `feature` in `layer`. Reselecting is a no-op.
    pub fn hit(&mut self, feature: FeatureId, layer: LayerId) -> Transition {
        if let Selection::Selected {
            feature: cur,
            layer: cur_layer,
        } = &self.state
            && *cur == feature
            && *cur_layer == layer
        {
            return Transition::default();
        }

        let clear = self.selected();
        self.state = Selection::Selected {
            feature: feature.clone(),
            layer,
        };
        Transition {
            clear,
            select: Some(FeatureRef { feature, layer }),
            notify: true,
        }
    }

    /// Pointer missed every selectable feature. The observer hears `null`
    /// each time.
    pub fn miss(&mut self) -> Transition {
        let clear = self.selected();
        self.state = Selection::Unselected;
        Transition {
            clear,
            select: None,
            notify: true,
        }
    }

    /// `layer` was destroyed or its features replaced. Nothing is left to
    /// clear, but a selection living there is gone.
    pub fn forget_layer(&mut self, layer: LayerId) -> Transition {
        match &self.state {
            Selection::Selected { layer: l, .. } if *l == layer => {
                self.state = Selection::Unselected;
                Transition {
                    clear: None,
                    select: None,
                    notify: true,
                }
            }
            _ => Transition::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use foundation::{FeatureId, LayerId};

    use super::{FeatureRef, Selection, SelectionCoordinator};

    fn f(s: &str) -> FeatureId {
        FeatureId::new(s)
    }

    #[test]
    fn hit_then_hit_elsewhere_clears_previous() {
        let mut s = SelectionCoordinator::new();
        let t = s.hit(f("a"), LayerId(1));
        assert_eq!(t.clear, None);
        assert!(t.notify);

        let t = s.hit(f("b"), LayerId(2));
        assert_eq!(
            t.clear,
            Some(FeatureRef {
                feature: f("a"),
                layer: LayerId(1)
            })
        );
        assert_eq!(t.select.map(|r| r.feature), Some(f("b")));
        assert_eq!(
            *s.state(),
            Selection::Selected {
                feature: f("b"),
                layer: LayerId(2)
            }
        );
    }

    #[test]
    fn reselect_is_a_noop() {
        let mut s = SelectionCoordinator::new();
        s.hit(f("a"), LayerId(1));
        assert!(s.hit(f("a"), LayerId(1)).is_noop());
    }

    #[test]
    fn miss_clears_and_always_notifies() {
        let mut s = SelectionCoordinator::new();
        s.hit(f("a"), LayerId(1));
        let t = s.miss();
        assert_eq!(t.clear.map(|r| r.feature), Some(f("a")));
        assert!(t.notify);
        assert_eq!(*s.state(), Selection::Unselected);

        let again = s.miss();
        assert_eq!(again.clear, None);
        assert!(again.notify);
    }

    #[test]
    fn forgetting_the_selected_layer_deselects() {
        let mut s = SelectionCoordinator::new();
        s.hit(f("a"), LayerId(3));
        assert!(s.forget_layer(LayerId(4)).is_noop());
        assert!(s.forget_layer(LayerId(3)).notify);
        assert_eq!(s.selected(), None);
    }
}
