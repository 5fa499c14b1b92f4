//! Entity outputs.

use chicago_datamap::{ClassId, FieldDescriptor};

use super::EntityOutput;
use crate::context::ParseContext;
use crate::Result;

impl<'a> ParseContext<'a> {
    fn output_classes(&mut self) -> Result<(ClassId, ClassId)> {
        if let Some(classes) = self.output_classes {
            return Ok(classes);
        }
        let classes = (
            self.lookup_class("CBaseEntityOutput")?,
            self.lookup_class("CEventAction")?,
        );
        self.output_classes = Some(classes);
        Ok(classes)
    }

    /// An action count, the output's value group, then one group per action.
    pub(crate) fn restore_entity_output(
        &mut self,
        field: &FieldDescriptor,
    ) -> Result<Option<EntityOutput<'a>>> {
        if field.n_elems == 0 {
            return Ok(None);
        }
        if field.n_elems > 1 {
            self.diag(format!(
                "entity output {} has {} elements, restoring one",
                field.name, field.n_elems
            ))?;
        }

        let (value_class, action_class) = self.output_classes()?;
        let count = self.element_count()?;
        let value = self.restore_group("Value", value_class)?;
        let actions = self.restore_array("EntityOutput", action_class, count)?;
        Ok(Some(EntityOutput { value, actions }))
    }
}
